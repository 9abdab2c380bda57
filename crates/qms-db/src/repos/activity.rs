//! Activity log repository.
//!
//! Append-only entries recording every mutation, written inside the
//! mutation's own transaction.

use chrono::Utc;
use serde::Serialize;

use qms_core::entities::ActivityEntry;
use qms_core::enums::{ActivityAction, EntityType};
use qms_core::ids::PREFIX_ACTIVITY;

use crate::error::DatabaseError;
use crate::helpers::{generate_id, get_opt_string, parse_datetime, parse_enum, parse_optional_json};
use crate::service::QmsService;

/// Filter criteria for activity queries.
#[derive(Debug, Default)]
pub struct ActivityFilter {
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<String>,
    pub action: Option<ActivityAction>,
    pub actor_id: Option<String>,
    pub limit: Option<u32>,
}

/// Serialize a typed detail payload for the `detail` column.
///
/// # Errors
///
/// Returns `DatabaseError::Other` if serialization fails.
pub fn detail<T: Serialize>(value: &T) -> Result<Option<serde_json::Value>, DatabaseError> {
    Ok(Some(serde_json::to_value(value)?))
}

/// Append an activity entry on `conn` (normally an open transaction).
///
/// # Errors
///
/// Returns `DatabaseError` if ID generation or the INSERT fails.
pub async fn append_activity(
    conn: &libsql::Connection,
    entity_type: EntityType,
    entity_id: &str,
    action: ActivityAction,
    actor_id: Option<&str>,
    detail: Option<serde_json::Value>,
) -> Result<ActivityEntry, DatabaseError> {
    let entry = ActivityEntry {
        id: generate_id(conn, PREFIX_ACTIVITY).await?,
        entity_type,
        entity_id: entity_id.to_string(),
        action,
        actor_id: actor_id.map(String::from),
        detail,
        created_at: Utc::now(),
    };
    conn.execute(
        "INSERT INTO activity_log (id, entity_type, entity_id, action, actor_id, detail, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        libsql::params![
            entry.id.as_str(),
            entry.entity_type.as_str(),
            entry.entity_id.as_str(),
            entry.action.as_str(),
            entry.actor_id.as_deref(),
            entry.detail.as_ref().map(std::string::ToString::to_string).as_deref(),
            entry.created_at.to_rfc3339()
        ],
    )
    .await?;
    Ok(entry)
}

impl QmsService {
    /// Query activity entries with optional filters, newest first.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn query_activity(
        &self,
        filter: &ActivityFilter,
    ) -> Result<Vec<ActivityEntry>, DatabaseError> {
        let _read = self.read_guard().await;
        let mut conditions = Vec::new();
        let mut params: Vec<libsql::Value> = Vec::new();

        if let Some(et) = filter.entity_type {
            params.push(libsql::Value::Text(et.as_str().to_string()));
            conditions.push(format!("entity_type = ?{}", params.len()));
        }
        if let Some(ref eid) = filter.entity_id {
            params.push(libsql::Value::Text(eid.clone()));
            conditions.push(format!("entity_id = ?{}", params.len()));
        }
        if let Some(action) = filter.action {
            params.push(libsql::Value::Text(action.as_str().to_string()));
            conditions.push(format!("action = ?{}", params.len()));
        }
        if let Some(ref actor) = filter.actor_id {
            params.push(libsql::Value::Text(actor.clone()));
            conditions.push(format!("actor_id = ?{}", params.len()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let limit = filter.limit.unwrap_or(100);
        let sql = format!(
            "SELECT id, entity_type, entity_id, action, actor_id, detail, created_at
             FROM activity_log {where_clause}
             ORDER BY created_at DESC, rowid DESC LIMIT {limit}"
        );

        let mut rows = self
            .db()
            .conn()
            .query(&sql, libsql::params_from_iter(params))
            .await?;
        let mut entries = Vec::new();

        while let Some(row) = rows.next().await? {
            entries.push(ActivityEntry {
                id: row.get::<String>(0)?,
                entity_type: parse_enum(&row.get::<String>(1)?)?,
                entity_id: row.get::<String>(2)?,
                action: parse_enum(&row.get::<String>(3)?)?,
                actor_id: get_opt_string(&row, 4)?,
                detail: parse_optional_json(get_opt_string(&row, 5)?.as_deref())?,
                created_at: parse_datetime(&row.get::<String>(6)?)?,
            });
        }

        Ok(entries)
    }
}
