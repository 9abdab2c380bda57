//! Non-conformity repository and the lifecycle operations on it.
//!
//! Rule decisions come from `qms_core::lifecycle`; this module loads the
//! aggregate, applies those rules under the write lock, and persists the
//! result in one transaction.

use chrono::{NaiveDate, Utc};

use qms_core::activity_detail::{ClosedDetail, StatusChangedDetail};
use qms_core::entities::NonConformity;
use qms_core::enums::{ActivityAction, EntityType, NcStatus, Severity};
use qms_core::ids::PREFIX_NC;
use qms_core::lifecycle::{
    StatusChange, check_closable, check_closure_preconditions, normalize_optional,
    plan_status_change, require_non_blank,
};
use qms_core::responses::NcView;
use qms_notify::Notification;

use crate::error::DatabaseError;
use crate::helpers::{
    ensure_exists, finish_tx, format_date, generate_id, get_opt_string, parse_datetime,
    parse_enum,
};
use crate::repos::action::load_actions_for_nc;
use crate::repos::activity::{append_activity, detail};
use crate::repos::checklist::load_instance;
use crate::repos::document::load_nc_documents;
use crate::repos::rca::{count_rca_steps, load_rca_steps};
use crate::repos::user::load_user;
use crate::service::QmsService;
use crate::updates::nc::NcUpdate;

const SELECT_COLS: &str = "n.id, n.audit_id, n.instance_id, n.clause_id, n.title, n.description, n.severity, n.status, n.created_by, n.assigned_to, n.created_at, n.updated_at";

fn row_to_nc(row: &libsql::Row) -> Result<NonConformity, DatabaseError> {
    Ok(NonConformity {
        id: row.get(0)?,
        audit_id: row.get(1)?,
        instance_id: get_opt_string(row, 2)?,
        clause_id: get_opt_string(row, 3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        severity: parse_enum(&row.get::<String>(6)?)?,
        status: parse_enum(&row.get::<String>(7)?)?,
        created_by: get_opt_string(row, 8)?,
        assigned_to: row.get(9)?,
        evidence: Vec::new(),
        created_at: parse_datetime(&row.get::<String>(10)?)?,
        updated_at: parse_datetime(&row.get::<String>(11)?)?,
    })
}

/// Input of `create_nc`.
///
/// `severity` is optional here so a missing value is reported as a validation
/// failure rather than a deserialization error at the edge.
#[derive(Debug, Clone, Copy, Default)]
pub struct NewNc<'a> {
    pub audit_id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub severity: Option<Severity>,
    pub assigned_to: &'a str,
    pub created_by: Option<&'a str>,
    pub instance_id: Option<&'a str>,
    pub clause_id: Option<&'a str>,
}

/// Filter criteria for NC listings.
#[derive(Debug, Default, Clone)]
pub struct NcFilter {
    pub status: Option<NcStatus>,
    pub severity: Option<Severity>,
    pub audit_id: Option<String>,
    pub assignee_id: Option<String>,
    pub limit: Option<u32>,
}

/// Read the ordered evidence identifiers of an NC.
async fn load_evidence(conn: &libsql::Connection, nc_id: &str) -> Result<Vec<String>, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT evidence_id FROM nc_evidence WHERE nc_id = ?1 ORDER BY position",
            [nc_id],
        )
        .await?;
    let mut evidence = Vec::new();
    while let Some(row) = rows.next().await? {
        evidence.push(row.get::<String>(0)?);
    }
    Ok(evidence)
}

pub(crate) async fn load_nc(conn: &libsql::Connection, id: &str) -> Result<NonConformity, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {SELECT_COLS} FROM non_conformities n WHERE n.id = ?1"),
            [id],
        )
        .await?;
    let row = rows
        .next()
        .await?
        .ok_or_else(|| DatabaseError::not_found(EntityType::NonConformity, id))?;
    let mut nc = row_to_nc(&row)?;
    nc.evidence = load_evidence(conn, id).await?;
    Ok(nc)
}

/// Assemble the full view of one NC. Callers hold a gate guard across the
/// call so all four reads see the same committed state.
pub(crate) async fn load_nc_view(conn: &libsql::Connection, id: &str) -> Result<NcView, DatabaseError> {
    let nc = load_nc(conn, id).await?;
    Ok(NcView {
        actions: load_actions_for_nc(conn, id).await?,
        rca_steps: load_rca_steps(conn, id).await?,
        documents: load_nc_documents(conn, id).await?,
        nc,
    })
}

async fn collect_ncs(
    conn: &libsql::Connection,
    mut rows: libsql::Rows,
) -> Result<Vec<NonConformity>, DatabaseError> {
    let mut ncs = Vec::new();
    while let Some(row) = rows.next().await? {
        ncs.push(row_to_nc(&row)?);
    }
    for nc in &mut ncs {
        nc.evidence = load_evidence(conn, &nc.id).await?;
    }
    Ok(ncs)
}

async fn query_ncs(
    conn: &libsql::Connection,
    filter: &NcFilter,
) -> Result<Vec<NonConformity>, DatabaseError> {
    let mut conditions = Vec::new();
    let mut params: Vec<libsql::Value> = Vec::new();

    if let Some(status) = filter.status {
        params.push(libsql::Value::Text(status.as_str().to_string()));
        conditions.push(format!("n.status = ?{}", params.len()));
    }
    if let Some(severity) = filter.severity {
        params.push(libsql::Value::Text(severity.as_str().to_string()));
        conditions.push(format!("n.severity = ?{}", params.len()));
    }
    if let Some(ref audit_id) = filter.audit_id {
        params.push(libsql::Value::Text(audit_id.clone()));
        conditions.push(format!("n.audit_id = ?{}", params.len()));
    }
    if let Some(ref assignee) = filter.assignee_id {
        params.push(libsql::Value::Text(assignee.clone()));
        conditions.push(format!("n.assigned_to = ?{}", params.len()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    let limit = filter.limit.unwrap_or(100);
    let sql = format!(
        "SELECT {SELECT_COLS} FROM non_conformities n {where_clause}
         ORDER BY n.created_at DESC, n.id LIMIT {limit}"
    );

    let rows = conn.query(&sql, libsql::params_from_iter(params)).await?;
    collect_ncs(conn, rows).await
}

impl QmsService {
    /// Record a new non-conformity in `PENDING`.
    ///
    /// When only an instance is given, the clause is taken from it.
    ///
    /// # Errors
    ///
    /// `Validation` for blank or missing required fields, or an instance that
    /// belongs to another audit; `NotFound` for any reference that does not
    /// resolve.
    pub async fn create_nc(
        &self,
        input: &NewNc<'_>,
        actor: Option<&str>,
    ) -> Result<NonConformity, DatabaseError> {
        let audit_id = require_non_blank("auditId", input.audit_id)?;
        let title = require_non_blank("title", input.title)?;
        let description = require_non_blank("description", input.description)?;
        let severity = input
            .severity
            .ok_or_else(|| DatabaseError::Validation("severity is required".into()))?;
        let assigned_to = require_non_blank("assignedToId", input.assigned_to)?;
        let created_by = normalize_optional(input.created_by);
        let instance_id = normalize_optional(input.instance_id);
        let mut clause_id = normalize_optional(input.clause_id);

        let guard = self.write_guard().await;
        let conn = self.db().conn();
        ensure_exists(conn, EntityType::Audit, &audit_id).await?;
        let assignee = load_user(conn, &assigned_to).await?;
        if let Some(ref creator) = created_by {
            ensure_exists(conn, EntityType::User, creator).await?;
        }
        if let Some(ref iid) = instance_id {
            let instance = load_instance(conn, iid).await?;
            if instance.audit_id != audit_id {
                return Err(DatabaseError::Validation(format!(
                    "instance {iid} belongs to audit {}, not {audit_id}",
                    instance.audit_id
                )));
            }
            if clause_id.is_none() {
                clause_id = Some(instance.clause_id);
            }
        }
        if let Some(ref cid) = clause_id {
            ensure_exists(conn, EntityType::Clause, cid).await?;
        }

        let now = Utc::now();
        let tx = self.begin().await?;
        let result = async {
            let id = generate_id(&tx, PREFIX_NC).await?;
            tx.execute(
                "INSERT INTO non_conformities (id, audit_id, instance_id, clause_id, title, description, severity, status, created_by, assigned_to, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                libsql::params![
                    id.as_str(),
                    audit_id.as_str(),
                    instance_id.as_deref(),
                    clause_id.as_deref(),
                    title.as_str(),
                    description.as_str(),
                    severity.as_str(),
                    NcStatus::Pending.as_str(),
                    created_by.as_deref(),
                    assigned_to.as_str(),
                    now.to_rfc3339(),
                    now.to_rfc3339()
                ],
            )
            .await?;
            append_activity(&tx, EntityType::NonConformity, &id, ActivityAction::Created, actor, None)
                .await?;
            Ok::<_, DatabaseError>(id)
        }
        .await;
        let id = finish_tx(tx, result).await?;
        drop(guard);

        tracing::info!(nc_id = %id, %severity, assignee = %assigned_to, "non-conformity created");

        let nc = NonConformity {
            id,
            audit_id,
            instance_id,
            clause_id,
            title,
            description,
            severity,
            status: NcStatus::Pending,
            created_by,
            assigned_to,
            evidence: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        let message = self.rules().nc_assigned().then(|| {
            Notification::nc_assigned(&assignee.email, &nc.id, &nc.title, nc.severity.as_str())
        });
        self.dispatch(message).await;

        Ok(nc)
    }

    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` if no NC has this id.
    pub async fn get_nc(&self, id: &str) -> Result<NonConformity, DatabaseError> {
        let _read = self.read_guard().await;
        load_nc(self.db().conn(), id).await
    }

    /// The NC with its actions, RCA steps, and linked documents, read as one
    /// consistent snapshot.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` if no NC has this id.
    pub async fn get_nc_view(&self, id: &str) -> Result<NcView, DatabaseError> {
        let _read = self.read_guard().await;
        load_nc_view(self.db().conn(), id).await
    }

    /// Newest first.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_ncs(&self, filter: &NcFilter) -> Result<Vec<NonConformity>, DatabaseError> {
        let _read = self.read_guard().await;
        query_ncs(self.db().conn(), filter).await
    }

    /// # Errors
    ///
    /// `NotFound` for an unknown audit.
    pub async fn list_ncs_for_audit(
        &self,
        audit_id: &str,
    ) -> Result<Vec<NonConformity>, DatabaseError> {
        let _read = self.read_guard().await;
        let conn = self.db().conn();
        ensure_exists(conn, EntityType::Audit, audit_id).await?;
        query_ncs(
            conn,
            &NcFilter {
                audit_id: Some(audit_id.to_string()),
                limit: Some(u32::MAX),
                ..NcFilter::default()
            },
        )
        .await
    }

    /// # Errors
    ///
    /// `NotFound` for an unknown user.
    pub async fn list_ncs_for_assignee(
        &self,
        user_id: &str,
        status: Option<NcStatus>,
    ) -> Result<Vec<NonConformity>, DatabaseError> {
        let _read = self.read_guard().await;
        let conn = self.db().conn();
        ensure_exists(conn, EntityType::User, user_id).await?;
        query_ncs(
            conn,
            &NcFilter {
                assignee_id: Some(user_id.to_string()),
                status,
                limit: Some(u32::MAX),
                ..NcFilter::default()
            },
        )
        .await
    }

    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_ncs_by_severity(
        &self,
        severity: Severity,
    ) -> Result<Vec<NonConformity>, DatabaseError> {
        self.list_ncs(&NcFilter {
            severity: Some(severity),
            limit: Some(u32::MAX),
            ..NcFilter::default()
        })
        .await
    }

    /// Open NCs with at least one unfinished action due strictly before `today`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_overdue_ncs(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<NonConformity>, DatabaseError> {
        let sql = format!(
            "SELECT {SELECT_COLS} FROM non_conformities n
             WHERE n.status IN ('PENDING', 'IN_PROGRESS')
               AND EXISTS (
                   SELECT 1 FROM corrective_actions a
                   WHERE a.nc_id = n.id
                     AND a.status != 'COMPLETED'
                     AND a.due_date IS NOT NULL
                     AND a.due_date < ?1
               )
             ORDER BY n.created_at, n.id"
        );
        let _read = self.read_guard().await;
        let conn = self.db().conn();
        let rows = conn.query(&sql, [format_date(today)]).await?;
        collect_ncs(conn, rows).await
    }

    /// Edit descriptive fields of an open NC.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown NC or assignee, `Validation` for blank
    /// values, `Conflict` when the NC is already closed.
    pub async fn update_nc(
        &self,
        nc_id: &str,
        update: NcUpdate,
        actor: Option<&str>,
    ) -> Result<NcView, DatabaseError> {
        let _guard = self.write_guard().await;
        let conn = self.db().conn();
        let current = load_nc(conn, nc_id).await?;
        if update.is_empty() {
            return load_nc_view(conn, nc_id).await;
        }
        if current.status.is_terminal() {
            return Err(DatabaseError::Conflict(format!(
                "non-conformity {nc_id} is {}; it can no longer be edited",
                current.status
            )));
        }

        let mut sets = Vec::new();
        let mut params: Vec<libsql::Value> = Vec::new();
        let mut idx = 1usize;

        if let Some(ref title) = update.title {
            sets.push(format!("title = ?{idx}"));
            params.push(require_non_blank("title", title)?.into());
            idx += 1;
        }
        if let Some(ref description) = update.description {
            sets.push(format!("description = ?{idx}"));
            params.push(require_non_blank("description", description)?.into());
            idx += 1;
        }
        if let Some(severity) = update.severity {
            sets.push(format!("severity = ?{idx}"));
            params.push(severity.as_str().into());
            idx += 1;
        }
        if let Some(ref assignee) = update.assigned_to {
            ensure_exists(conn, EntityType::User, assignee).await?;
            sets.push(format!("assigned_to = ?{idx}"));
            params.push(assignee.clone().into());
            idx += 1;
        }

        sets.push(format!("updated_at = ?{idx}"));
        params.push(Utc::now().to_rfc3339().into());
        idx += 1;
        params.push(nc_id.into());
        let sql = format!("UPDATE non_conformities SET {} WHERE id = ?{idx}", sets.join(", "));

        let tx = self.begin().await?;
        let result = async {
            tx.execute(&sql, libsql::params_from_iter(params)).await?;
            append_activity(
                &tx,
                EntityType::NonConformity,
                nc_id,
                ActivityAction::Updated,
                actor,
                detail(&update)?,
            )
            .await?;
            Ok::<_, DatabaseError>(())
        }
        .await;
        finish_tx(tx, result).await?;

        load_nc_view(conn, nc_id).await
    }

    /// Set the NC status directly.
    ///
    /// A terminal status only accepts itself. Entering `COMPLETED` or `CLOSED`
    /// from an open status requires the same severity/RCA and action checks
    /// as `close_nc`; evidence is not touched.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown NC, `Conflict` when leaving a terminal
    /// status, `Validation` when closure preconditions are unmet.
    pub async fn update_nc_status(
        &self,
        nc_id: &str,
        status: NcStatus,
        actor: Option<&str>,
    ) -> Result<NcView, DatabaseError> {
        let _guard = self.write_guard().await;
        let conn = self.db().conn();
        let current = load_nc(conn, nc_id).await?;

        match plan_status_change(nc_id, current.status, status)? {
            StatusChange::Unchanged => return load_nc_view(conn, nc_id).await,
            StatusChange::Guarded => {
                let actions = load_actions_for_nc(conn, nc_id).await?;
                let rca_steps = count_rca_steps(conn, nc_id).await?;
                check_closure_preconditions(current.severity, &actions, rca_steps)?;
            }
            StatusChange::Direct => {}
        }

        if current.status != status {
            let now = Utc::now();
            let tx = self.begin().await?;
            let result = async {
                tx.execute(
                    "UPDATE non_conformities SET status = ?1, updated_at = ?2 WHERE id = ?3",
                    libsql::params![status.as_str(), now.to_rfc3339(), nc_id],
                )
                .await?;
                append_activity(
                    &tx,
                    EntityType::NonConformity,
                    nc_id,
                    ActivityAction::StatusChanged,
                    actor,
                    detail(&StatusChangedDetail {
                        from: current.status.as_str().to_string(),
                        to: status.as_str().to_string(),
                        reason: None,
                    })?,
                )
                .await?;
                Ok::<_, DatabaseError>(())
            }
            .await;
            finish_tx(tx, result).await?;
            tracing::info!(%nc_id, from = %current.status, to = %status, "non-conformity status updated");
        }

        load_nc_view(conn, nc_id).await
    }

    /// Close an NC: check the preconditions in order, append any final
    /// evidence, and set `COMPLETED`.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown NC; `Conflict` when already closed;
    /// `Validation` when a HIGH NC lacks RCA steps, an action is unfinished,
    /// or an evidence identifier is blank.
    pub async fn close_nc(
        &self,
        nc_id: &str,
        final_evidence_ids: &[String],
        reviewer_comment: Option<&str>,
        actor: Option<&str>,
    ) -> Result<NcView, DatabaseError> {
        let reviewer_comment = normalize_optional(reviewer_comment);

        let guard = self.write_guard().await;
        let conn = self.db().conn();
        let nc = load_nc(conn, nc_id).await?;
        let actions = load_actions_for_nc(conn, nc_id).await?;
        let rca_steps = count_rca_steps(conn, nc_id).await?;
        check_closable(&nc, &actions, rca_steps)?;

        let evidence = final_evidence_ids
            .iter()
            .map(|e| require_non_blank("evidence id", e))
            .collect::<Result<Vec<_>, _>>()?;

        let now = Utc::now();
        let tx = self.begin().await?;
        let result = async {
            for (position, evidence_id) in (nc.evidence.len()..).zip(&evidence) {
                let position = i64::try_from(position)
                    .map_err(|_| DatabaseError::InvalidState("evidence list too long".into()))?;
                tx.execute(
                    "INSERT INTO nc_evidence (nc_id, position, evidence_id) VALUES (?1, ?2, ?3)",
                    libsql::params![nc_id, position, evidence_id.as_str()],
                )
                .await?;
            }
            tx.execute(
                "UPDATE non_conformities SET status = ?1, updated_at = ?2 WHERE id = ?3",
                libsql::params![NcStatus::Completed.as_str(), now.to_rfc3339(), nc_id],
            )
            .await?;
            append_activity(
                &tx,
                EntityType::NonConformity,
                nc_id,
                ActivityAction::Closed,
                actor,
                detail(&ClosedDetail {
                    evidence_added: evidence.clone(),
                    reviewer_comment: reviewer_comment.clone(),
                })?,
            )
            .await?;
            Ok::<_, DatabaseError>(())
        }
        .await;
        finish_tx(tx, result).await?;
        let view = load_nc_view(conn, nc_id).await?;
        drop(guard);

        tracing::info!(%nc_id, evidence_added = evidence.len(), "non-conformity closed");
        Ok(view)
    }
}
