use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::AuditStatus;

/// A compliance audit against one or more standards.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Audit {
    pub id: String,
    pub title: String,
    pub scope: String,
    /// Grouping key for per-department compliance; `None` aggregates as `UNKNOWN`.
    pub department: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: AuditStatus,
    pub created_by: Option<String>,
    pub auditor_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
