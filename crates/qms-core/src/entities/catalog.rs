use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::MappingRelation;

/// An ISO (or similar) standard, e.g. `ISO 9001`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Standard {
    pub id: String,
    pub code: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// One requirement clause of a standard, e.g. `7.5.3 Control of documented information`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Clause {
    pub id: String,
    pub standard_id: String,
    pub number: String,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Cross-standard correspondence between two clauses.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ClauseMapping {
    pub id: String,
    pub source_clause_id: String,
    pub target_clause_id: String,
    pub relation: MappingRelation,
    pub created_at: DateTime<Utc>,
}
