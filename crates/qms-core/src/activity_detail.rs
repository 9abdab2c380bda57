//! Typed activity-log detail payloads.
//!
//! Each activity action can carry a structured `detail` JSON blob.

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Detail for `ActivityAction::StatusChanged`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct StatusChangedDetail {
    pub from: String,
    pub to: String,
    pub reason: Option<String>,
}

/// Detail for `ActivityAction::ActionAdded`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ActionAddedDetail {
    pub action_id: String,
    pub responsible_id: String,
    pub due_date: Option<NaiveDate>,
}

/// Detail for `ActivityAction::ActionReviewed`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ActionReviewedDetail {
    pub reviewer_id: String,
    pub approved: bool,
    pub comments: Option<String>,
}

/// Detail for `ActivityAction::RcaSubmitted`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct RcaSubmittedDetail {
    pub replaced: u32,
    pub steps: u32,
}

/// Detail for `ActivityAction::Closed`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ClosedDetail {
    pub evidence_added: Vec<String>,
    pub reviewer_comment: Option<String>,
}

/// Detail for `ActivityAction::Evaluated`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct EvaluatedDetail {
    pub from: Option<String>,
    pub to: String,
}
