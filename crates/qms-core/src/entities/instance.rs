use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{ConformityStatus, Severity};

/// One audit's evaluation of one checklist item.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Instance {
    pub id: String,
    pub audit_id: String,
    pub checklist_item_id: String,
    pub clause_id: String,
    /// `None` until the item has been evaluated.
    pub conformity_status: Option<ConformityStatus>,
    pub severity: Option<Severity>,
    pub comments: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
