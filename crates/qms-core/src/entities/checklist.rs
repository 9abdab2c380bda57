use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A named checklist attached to an audit.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Checklist {
    pub id: String,
    pub audit_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// One question of a checklist, tied to a clause.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ChecklistItem {
    pub id: String,
    pub checklist_id: String,
    pub clause_id: String,
    pub question: String,
    pub position: u32,
}
