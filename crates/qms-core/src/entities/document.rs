use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A stored document usable as evidence. The file itself lives elsewhere;
/// `reference` is its URI.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub reference: String,
    pub uploaded_by: Option<String>,
    pub created_at: DateTime<Utc>,
}
