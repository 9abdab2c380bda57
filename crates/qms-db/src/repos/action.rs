//! Corrective action repository.
//!
//! Every operation returns the owning NC's full view, since callers render
//! the NC rather than the action.

use chrono::{NaiveDate, Utc};

use qms_core::activity_detail::{ActionAddedDetail, ActionReviewedDetail, StatusChangedDetail};
use qms_core::entities::{ActionReview, CorrectiveAction};
use qms_core::enums::{ActionStatus, ActivityAction, EntityType};
use qms_core::ids::PREFIX_ACTION;
use qms_core::lifecycle::{
    normalize_optional, require_non_blank, status_after_action_added, status_after_review,
};
use qms_core::responses::NcView;
use qms_notify::Notification;

use crate::error::DatabaseError;
use crate::helpers::{
    finish_tx, format_date, generate_id, get_opt_string, parse_datetime, parse_enum,
    parse_optional_date, parse_optional_datetime,
};
use crate::repos::activity::{append_activity, detail};
use crate::repos::nc::{load_nc, load_nc_view};
use crate::repos::user::load_user;
use crate::service::QmsService;

const SELECT_COLS: &str = "id, nc_id, description, responsible_id, due_date, status, reviewer_id, review_approved, review_comments, reviewed_at, created_at, updated_at";

pub(crate) fn row_to_action(row: &libsql::Row) -> Result<CorrectiveAction, DatabaseError> {
    let reviewer_id = get_opt_string(row, 6)?;
    let reviewed_at = parse_optional_datetime(get_opt_string(row, 9)?.as_deref())?;
    let review = match (reviewer_id, reviewed_at) {
        (Some(reviewer_id), Some(reviewed_at)) => Some(ActionReview {
            reviewer_id,
            approved: row.get::<Option<i64>>(7)?.unwrap_or(0) != 0,
            comments: get_opt_string(row, 8)?,
            reviewed_at,
        }),
        _ => None,
    };

    Ok(CorrectiveAction {
        id: row.get(0)?,
        nc_id: row.get(1)?,
        description: row.get(2)?,
        responsible_id: row.get(3)?,
        due_date: parse_optional_date(get_opt_string(row, 4)?.as_deref())?,
        status: parse_enum(&row.get::<String>(5)?)?,
        review,
        created_at: parse_datetime(&row.get::<String>(10)?)?,
        updated_at: parse_datetime(&row.get::<String>(11)?)?,
    })
}

pub(crate) async fn load_action(
    conn: &libsql::Connection,
    id: &str,
) -> Result<CorrectiveAction, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {SELECT_COLS} FROM corrective_actions WHERE id = ?1"),
            [id],
        )
        .await?;
    let row = rows
        .next()
        .await?
        .ok_or_else(|| DatabaseError::not_found(EntityType::CorrectiveAction, id))?;
    row_to_action(&row)
}

pub(crate) async fn load_actions_for_nc(
    conn: &libsql::Connection,
    nc_id: &str,
) -> Result<Vec<CorrectiveAction>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {SELECT_COLS} FROM corrective_actions WHERE nc_id = ?1 ORDER BY created_at, id"
            ),
            [nc_id],
        )
        .await?;
    let mut actions = Vec::new();
    while let Some(row) = rows.next().await? {
        actions.push(row_to_action(&row)?);
    }
    Ok(actions)
}

impl QmsService {
    /// Add a corrective action to an open NC.
    ///
    /// The first action moves a `PENDING` NC to `IN_PROGRESS`. The
    /// responsible user is notified after commit.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank description, `NotFound` for an unknown NC or
    /// responsible user, `Conflict` when the NC is already closed.
    pub async fn add_corrective_action(
        &self,
        nc_id: &str,
        description: &str,
        responsible_id: &str,
        due_date: Option<NaiveDate>,
        actor: Option<&str>,
    ) -> Result<NcView, DatabaseError> {
        let description = require_non_blank("description", description)?;
        let responsible_id = require_non_blank("responsibleId", responsible_id)?;

        let guard = self.write_guard().await;
        let conn = self.db().conn();
        let nc = load_nc(conn, nc_id).await?;
        let responsible = load_user(conn, &responsible_id).await?;
        if nc.status.is_terminal() {
            return Err(DatabaseError::Conflict(format!(
                "non-conformity {nc_id} is {}; corrective actions can no longer be added",
                nc.status
            )));
        }

        let next_status = status_after_action_added(nc.status);
        let now = Utc::now();
        let tx = self.begin().await?;
        let result = async {
            let id = generate_id(&tx, PREFIX_ACTION).await?;
            tx.execute(
                "INSERT INTO corrective_actions (id, nc_id, description, responsible_id, due_date, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                libsql::params![
                    id.as_str(),
                    nc_id,
                    description.as_str(),
                    responsible_id.as_str(),
                    due_date.map(format_date),
                    ActionStatus::Pending.as_str(),
                    now.to_rfc3339(),
                    now.to_rfc3339()
                ],
            )
            .await?;
            append_activity(
                &tx,
                EntityType::NonConformity,
                nc_id,
                ActivityAction::ActionAdded,
                actor,
                detail(&ActionAddedDetail {
                    action_id: id.clone(),
                    responsible_id: responsible_id.clone(),
                    due_date,
                })?,
            )
            .await?;

            if next_status != nc.status {
                tx.execute(
                    "UPDATE non_conformities SET status = ?1, updated_at = ?2 WHERE id = ?3",
                    libsql::params![next_status.as_str(), now.to_rfc3339(), nc_id],
                )
                .await?;
                append_activity(
                    &tx,
                    EntityType::NonConformity,
                    nc_id,
                    ActivityAction::StatusChanged,
                    actor,
                    detail(&StatusChangedDetail {
                        from: nc.status.as_str().to_string(),
                        to: next_status.as_str().to_string(),
                        reason: Some("first corrective action".into()),
                    })?,
                )
                .await?;
            } else {
                tx.execute(
                    "UPDATE non_conformities SET updated_at = ?1 WHERE id = ?2",
                    libsql::params![now.to_rfc3339(), nc_id],
                )
                .await?;
            }
            Ok::<_, DatabaseError>(id)
        }
        .await;
        let action_id = finish_tx(tx, result).await?;
        let view = load_nc_view(conn, nc_id).await?;
        drop(guard);

        tracing::info!(%nc_id, %action_id, responsible = %responsible_id, "corrective action added");

        let message = self.rules().action_assigned().then(|| {
            Notification::action_assigned(&responsible.email, nc_id, &description, due_date)
        });
        self.dispatch(message).await;

        Ok(view)
    }

    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` if no action has this id.
    pub async fn get_action(&self, id: &str) -> Result<CorrectiveAction, DatabaseError> {
        let _read = self.read_guard().await;
        load_action(self.db().conn(), id).await
    }

    /// Set an action's status. No further checks apply.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown action.
    pub async fn update_action_status(
        &self,
        action_id: &str,
        status: ActionStatus,
        actor: Option<&str>,
    ) -> Result<NcView, DatabaseError> {
        let guard = self.write_guard().await;
        let conn = self.db().conn();
        let action = load_action(conn, action_id).await?;

        if action.status != status {
            let tx = self.begin().await?;
            let result = async {
                tx.execute(
                    "UPDATE corrective_actions SET status = ?1, updated_at = ?2 WHERE id = ?3",
                    libsql::params![status.as_str(), Utc::now().to_rfc3339(), action_id],
                )
                .await?;
                append_activity(
                    &tx,
                    EntityType::CorrectiveAction,
                    action_id,
                    ActivityAction::StatusChanged,
                    actor,
                    detail(&StatusChangedDetail {
                        from: action.status.as_str().to_string(),
                        to: status.as_str().to_string(),
                        reason: None,
                    })?,
                )
                .await?;
                Ok::<_, DatabaseError>(())
            }
            .await;
            finish_tx(tx, result).await?;
            tracing::debug!(%action_id, from = %action.status, to = %status, "action status updated");
        }
        let view = load_nc_view(conn, &action.nc_id).await?;
        drop(guard);

        Ok(view)
    }

    /// Record a reviewer verdict. Approval completes the action, rejection
    /// sends it back to `IN_PROGRESS`.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown action or reviewer.
    pub async fn review_action(
        &self,
        action_id: &str,
        reviewer_id: &str,
        approved: bool,
        comments: Option<&str>,
        actor: Option<&str>,
    ) -> Result<NcView, DatabaseError> {
        let reviewer_id = require_non_blank("reviewerId", reviewer_id)?;
        let comments = normalize_optional(comments);

        let guard = self.write_guard().await;
        let conn = self.db().conn();
        let action = load_action(conn, action_id).await?;
        load_user(conn, &reviewer_id).await?;

        let status = status_after_review(approved);
        let now = Utc::now();
        let tx = self.begin().await?;
        let result = async {
            tx.execute(
                "UPDATE corrective_actions
                 SET status = ?1, reviewer_id = ?2, review_approved = ?3, review_comments = ?4,
                     reviewed_at = ?5, updated_at = ?5
                 WHERE id = ?6",
                libsql::params![
                    status.as_str(),
                    reviewer_id.as_str(),
                    i64::from(approved),
                    comments.as_deref(),
                    now.to_rfc3339(),
                    action_id
                ],
            )
            .await?;
            append_activity(
                &tx,
                EntityType::CorrectiveAction,
                action_id,
                ActivityAction::ActionReviewed,
                actor,
                detail(&ActionReviewedDetail {
                    reviewer_id: reviewer_id.clone(),
                    approved,
                    comments: comments.clone(),
                })?,
            )
            .await?;
            Ok::<_, DatabaseError>(())
        }
        .await;
        finish_tx(tx, result).await?;
        let view = load_nc_view(conn, &action.nc_id).await?;
        drop(guard);

        tracing::info!(%action_id, %reviewer_id, approved, "corrective action reviewed");
        Ok(view)
    }

    /// Actions of one NC in creation order.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_actions_for_nc(
        &self,
        nc_id: &str,
    ) -> Result<Vec<CorrectiveAction>, DatabaseError> {
        let _read = self.read_guard().await;
        load_actions_for_nc(self.db().conn(), nc_id).await
    }

    /// Every action not yet `COMPLETED`, earliest due date first.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_open_actions(&self) -> Result<Vec<CorrectiveAction>, DatabaseError> {
        let _read = self.read_guard().await;
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM corrective_actions
                     WHERE status != 'COMPLETED'
                     ORDER BY due_date IS NULL, due_date, id"
                ),
                (),
            )
            .await?;
        let mut actions = Vec::new();
        while let Some(row) = rows.next().await? {
            actions.push(row_to_action(&row)?);
        }
        Ok(actions)
    }
}
