use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One "why" in a root-cause chain.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct RcaStep {
    pub id: String,
    pub nc_id: String,
    /// 1-based, contiguous across the NC's steps.
    pub step_number: u32,
    pub why_text: String,
    pub created_at: DateTime<Utc>,
}

/// A submitted RCA step before persistence.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct RcaStepInput {
    pub step_number: u32,
    pub why_text: String,
}

impl RcaStepInput {
    pub fn new(step_number: u32, why_text: impl Into<String>) -> Self {
        Self {
            step_number,
            why_text: why_text.into(),
        }
    }
}
