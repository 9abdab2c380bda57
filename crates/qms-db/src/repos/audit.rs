//! Audit repository: CRUD, forward-only status transitions, auditor assignment.

use chrono::{NaiveDate, Utc};

use qms_core::activity_detail::StatusChangedDetail;
use qms_core::entities::Audit;
use qms_core::enums::{ActivityAction, AuditStatus, EntityType};
use qms_core::ids::PREFIX_AUDIT;
use qms_core::lifecycle::{normalize_optional, require_non_blank};

use crate::error::DatabaseError;
use crate::helpers::{
    ensure_exists, finish_tx, format_date, generate_id, get_opt_string, parse_datetime,
    parse_enum, parse_optional_date,
};
use crate::repos::activity::{append_activity, detail};
use crate::service::QmsService;
use crate::updates::audit::AuditUpdate;

const SELECT_COLS: &str =
    "id, title, scope, department, start_date, end_date, status, created_by, created_at, updated_at";

fn row_to_audit(row: &libsql::Row) -> Result<Audit, DatabaseError> {
    Ok(Audit {
        id: row.get(0)?,
        title: row.get(1)?,
        scope: row.get(2)?,
        department: get_opt_string(row, 3)?,
        start_date: parse_optional_date(get_opt_string(row, 4)?.as_deref())?,
        end_date: parse_optional_date(get_opt_string(row, 5)?.as_deref())?,
        status: parse_enum(&row.get::<String>(6)?)?,
        created_by: get_opt_string(row, 7)?,
        auditor_ids: Vec::new(),
        created_at: parse_datetime(&row.get::<String>(8)?)?,
        updated_at: parse_datetime(&row.get::<String>(9)?)?,
    })
}

#[derive(Debug, Clone, Copy)]
pub struct NewAudit<'a> {
    pub title: &'a str,
    pub scope: &'a str,
    pub department: Option<&'a str>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_by: Option<&'a str>,
}

/// Filter criteria for audit listings.
#[derive(Debug, Default)]
pub struct AuditFilter {
    pub status: Option<AuditStatus>,
    pub department: Option<String>,
    pub limit: Option<u32>,
}

fn check_date_order(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<(), DatabaseError> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(DatabaseError::Validation(format!(
                "end date {end} is before start date {start}"
            )));
        }
    }
    Ok(())
}

pub(crate) async fn load_audit(conn: &libsql::Connection, id: &str) -> Result<Audit, DatabaseError> {
    let mut rows = conn
        .query(&format!("SELECT {SELECT_COLS} FROM audits WHERE id = ?1"), [id])
        .await?;
    let row = rows
        .next()
        .await?
        .ok_or_else(|| DatabaseError::not_found(EntityType::Audit, id))?;
    let mut audit = row_to_audit(&row)?;
    audit.auditor_ids = load_auditors(conn, id).await?;
    Ok(audit)
}

async fn load_auditors(conn: &libsql::Connection, audit_id: &str) -> Result<Vec<String>, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT user_id FROM audit_auditors WHERE audit_id = ?1 ORDER BY user_id",
            [audit_id],
        )
        .await?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next().await? {
        ids.push(row.get::<String>(0)?);
    }
    Ok(ids)
}

impl QmsService {
    /// Create an audit in `PLANNED`.
    ///
    /// # Errors
    ///
    /// `Validation` for blank title/scope or inverted dates, `NotFound` for an
    /// unknown creator.
    pub async fn create_audit(
        &self,
        input: &NewAudit<'_>,
        actor: Option<&str>,
    ) -> Result<Audit, DatabaseError> {
        let title = require_non_blank("title", input.title)?;
        let scope = require_non_blank("scope", input.scope)?;
        let department = normalize_optional(input.department);
        check_date_order(input.start_date, input.end_date)?;

        let _guard = self.write_guard().await;
        if let Some(creator) = input.created_by {
            ensure_exists(self.db().conn(), EntityType::User, creator).await?;
        }

        let now = Utc::now();
        let tx = self.begin().await?;
        let result = async {
            let id = generate_id(&tx, PREFIX_AUDIT).await?;
            tx.execute(
                "INSERT INTO audits (id, title, scope, department, start_date, end_date, status, created_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                libsql::params![
                    id.as_str(),
                    title.as_str(),
                    scope.as_str(),
                    department.as_deref(),
                    input.start_date.map(format_date),
                    input.end_date.map(format_date),
                    AuditStatus::Planned.as_str(),
                    input.created_by,
                    now.to_rfc3339(),
                    now.to_rfc3339()
                ],
            )
            .await?;
            append_activity(&tx, EntityType::Audit, &id, ActivityAction::Created, actor, None)
                .await?;
            Ok::<_, DatabaseError>(id)
        }
        .await;
        let id = finish_tx(tx, result).await?;

        Ok(Audit {
            id,
            title,
            scope,
            department,
            start_date: input.start_date,
            end_date: input.end_date,
            status: AuditStatus::Planned,
            created_by: input.created_by.map(String::from),
            auditor_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` if no audit has this id.
    pub async fn get_audit(&self, id: &str) -> Result<Audit, DatabaseError> {
        let _read = self.read_guard().await;
        load_audit(self.db().conn(), id).await
    }

    /// Newest first.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_audits(&self, filter: &AuditFilter) -> Result<Vec<Audit>, DatabaseError> {
        let _read = self.read_guard().await;
        let conn = self.db().conn();
        let mut conditions = Vec::new();
        let mut params: Vec<libsql::Value> = Vec::new();

        if let Some(status) = filter.status {
            params.push(libsql::Value::Text(status.as_str().to_string()));
            conditions.push(format!("status = ?{}", params.len()));
        }
        if let Some(ref department) = filter.department {
            params.push(libsql::Value::Text(department.clone()));
            conditions.push(format!("department = ?{}", params.len()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let limit = filter.limit.unwrap_or(100);
        let sql = format!(
            "SELECT {SELECT_COLS} FROM audits {where_clause} ORDER BY created_at DESC LIMIT {limit}"
        );

        let mut rows = conn.query(&sql, libsql::params_from_iter(params)).await?;
        let mut audits = Vec::new();
        while let Some(row) = rows.next().await? {
            audits.push(row_to_audit(&row)?);
        }
        for audit in &mut audits {
            audit.auditor_ids = load_auditors(conn, &audit.id).await?;
        }
        Ok(audits)
    }

    /// Apply a partial update to the descriptive fields.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown audit, `Validation` for blank title/scope or
    /// inverted dates, `Conflict` when the audit is `CLOSED`.
    pub async fn update_audit(
        &self,
        audit_id: &str,
        update: AuditUpdate,
        actor: Option<&str>,
    ) -> Result<Audit, DatabaseError> {
        let _guard = self.write_guard().await;
        let current = load_audit(self.db().conn(), audit_id).await?;
        if update.is_empty() {
            return Ok(current);
        }
        if current.status == AuditStatus::Closed {
            return Err(DatabaseError::Conflict(format!("audit {audit_id} is CLOSED")));
        }

        let start = update.start_date.unwrap_or(current.start_date);
        let end = update.end_date.unwrap_or(current.end_date);
        check_date_order(start, end)?;

        let mut sets = Vec::new();
        let mut params: Vec<libsql::Value> = Vec::new();
        let mut idx = 1usize;

        if let Some(ref title) = update.title {
            sets.push(format!("title = ?{idx}"));
            params.push(require_non_blank("title", title)?.into());
            idx += 1;
        }
        if let Some(ref scope) = update.scope {
            sets.push(format!("scope = ?{idx}"));
            params.push(require_non_blank("scope", scope)?.into());
            idx += 1;
        }
        if let Some(ref department) = update.department {
            sets.push(format!("department = ?{idx}"));
            params.push(
                normalize_optional(department.as_deref()).map_or(libsql::Value::Null, Into::into),
            );
            idx += 1;
        }
        if let Some(start_date) = update.start_date {
            sets.push(format!("start_date = ?{idx}"));
            params.push(start_date.map(format_date).map_or(libsql::Value::Null, Into::into));
            idx += 1;
        }
        if let Some(end_date) = update.end_date {
            sets.push(format!("end_date = ?{idx}"));
            params.push(end_date.map(format_date).map_or(libsql::Value::Null, Into::into));
            idx += 1;
        }

        let now = Utc::now();
        sets.push(format!("updated_at = ?{idx}"));
        params.push(now.to_rfc3339().into());
        idx += 1;
        params.push(audit_id.into());
        let sql = format!("UPDATE audits SET {} WHERE id = ?{idx}", sets.join(", "));

        let tx = self.begin().await?;
        let result = async {
            tx.execute(&sql, libsql::params_from_iter(params)).await?;
            append_activity(
                &tx,
                EntityType::Audit,
                audit_id,
                ActivityAction::Updated,
                actor,
                detail(&update)?,
            )
            .await?;
            Ok::<_, DatabaseError>(())
        }
        .await;
        finish_tx(tx, result).await?;

        load_audit(self.db().conn(), audit_id).await
    }

    /// Move an audit one step along `PLANNED → IN_PROGRESS → COMPLETED → CLOSED`.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown audit, `Conflict` for any other transition.
    pub async fn transition_audit(
        &self,
        audit_id: &str,
        next: AuditStatus,
        actor: Option<&str>,
    ) -> Result<Audit, DatabaseError> {
        let _guard = self.write_guard().await;
        let current = load_audit(self.db().conn(), audit_id).await?;
        if !current.status.can_transition_to(next) {
            return Err(DatabaseError::Conflict(format!(
                "audit {audit_id} cannot move from {} to {next}",
                current.status
            )));
        }

        let now = Utc::now();
        let tx = self.begin().await?;
        let result = async {
            tx.execute(
                "UPDATE audits SET status = ?1, updated_at = ?2 WHERE id = ?3",
                libsql::params![next.as_str(), now.to_rfc3339(), audit_id],
            )
            .await?;
            append_activity(
                &tx,
                EntityType::Audit,
                audit_id,
                ActivityAction::StatusChanged,
                actor,
                detail(&StatusChangedDetail {
                    from: current.status.as_str().to_string(),
                    to: next.as_str().to_string(),
                    reason: None,
                })?,
            )
            .await?;
            Ok::<_, DatabaseError>(())
        }
        .await;
        finish_tx(tx, result).await?;

        load_audit(self.db().conn(), audit_id).await
    }

    /// Add `user_id` to the audit's auditors. Assigning twice is a no-op.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown audit or user.
    pub async fn assign_auditor(
        &self,
        audit_id: &str,
        user_id: &str,
        actor: Option<&str>,
    ) -> Result<Audit, DatabaseError> {
        let _guard = self.write_guard().await;
        let conn = self.db().conn();
        ensure_exists(conn, EntityType::Audit, audit_id).await?;
        ensure_exists(conn, EntityType::User, user_id).await?;

        let tx = self.begin().await?;
        let result = async {
            let inserted = tx
                .execute(
                    "INSERT OR IGNORE INTO audit_auditors (audit_id, user_id) VALUES (?1, ?2)",
                    [audit_id, user_id],
                )
                .await?;
            if inserted > 0 {
                append_activity(
                    &tx,
                    EntityType::Audit,
                    audit_id,
                    ActivityAction::Linked,
                    actor,
                    Some(serde_json::json!({ "auditor_id": user_id })),
                )
                .await?;
            }
            Ok::<_, DatabaseError>(())
        }
        .await;
        finish_tx(tx, result).await?;

        load_audit(self.db().conn(), audit_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::helpers::{seed_audit, seed_user, test_service};
    use crate::updates::audit::AuditUpdateBuilder;
    use pretty_assertions::assert_eq;
    use qms_core::enums::Role;

    #[tokio::test]
    async fn create_and_get_audit() {
        let svc = test_service().await;
        let audit = seed_audit(&svc, Some("Production")).await;
        assert_eq!(audit.status, AuditStatus::Planned);

        let fetched = svc.get_audit(&audit.id).await.unwrap();
        assert_eq!(fetched.department.as_deref(), Some("Production"));
        assert!(fetched.auditor_ids.is_empty());
    }

    #[tokio::test]
    async fn inverted_dates_are_rejected() {
        let svc = test_service().await;
        let err = svc
            .create_audit(
                &NewAudit {
                    title: "A",
                    scope: "S",
                    department: None,
                    start_date: NaiveDate::from_ymd_opt(2026, 5, 2),
                    end_date: NaiveDate::from_ymd_opt(2026, 5, 1),
                    created_by: None,
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Validation(_)));
    }

    #[tokio::test]
    async fn transitions_are_forward_only() {
        let svc = test_service().await;
        let audit = seed_audit(&svc, None).await;

        let skipped = svc.transition_audit(&audit.id, AuditStatus::Completed, None).await;
        assert!(matches!(skipped, Err(DatabaseError::Conflict(_))));

        let started = svc
            .transition_audit(&audit.id, AuditStatus::InProgress, None)
            .await
            .unwrap();
        assert_eq!(started.status, AuditStatus::InProgress);

        let back = svc.transition_audit(&audit.id, AuditStatus::Planned, None).await;
        assert!(matches!(back, Err(DatabaseError::Conflict(_))));
    }

    #[tokio::test]
    async fn update_audit_changes_only_given_fields() {
        let svc = test_service().await;
        let audit = seed_audit(&svc, Some("Ops")).await;
        let updated = svc
            .update_audit(
                &audit.id,
                AuditUpdateBuilder::new().title("Renamed").department(None).build(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.scope, audit.scope);
        assert_eq!(updated.department, None);
    }

    #[tokio::test]
    async fn auditors_are_assigned_once() {
        let svc = test_service().await;
        let audit = seed_audit(&svc, None).await;
        let user = seed_user(&svc, "Ana", &[Role::Auditor]).await;

        svc.assign_auditor(&audit.id, &user.id, None).await.unwrap();
        let audit = svc.assign_auditor(&audit.id, &user.id, None).await.unwrap();
        assert_eq!(audit.auditor_ids, vec![user.id]);

        let missing = svc.assign_auditor(&audit.id, "usr-nope", None).await;
        assert!(matches!(missing, Err(DatabaseError::NotFound { .. })));
    }
}
