use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{NcStatus, Severity};

/// A recorded failure to meet an audit clause's requirement.
///
/// Corrective actions and RCA steps are owned by the NC and loaded separately
/// (see `responses::NcView`).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct NonConformity {
    pub id: String,
    pub audit_id: String,
    pub instance_id: Option<String>,
    pub clause_id: Option<String>,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub status: NcStatus,
    pub created_by: Option<String>,
    pub assigned_to: String,
    /// Free-form evidence identifiers, in the order they were supplied.
    pub evidence: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
