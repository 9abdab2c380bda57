use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::ActionStatus;

/// A remediation task assigned to a responsible user for one non-conformity.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct CorrectiveAction {
    pub id: String,
    pub nc_id: String,
    pub description: String,
    pub responsible_id: String,
    pub due_date: Option<NaiveDate>,
    pub status: ActionStatus,
    /// Populated only through the approve/reject operation.
    pub review: Option<ActionReview>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CorrectiveAction {
    /// Open and past its due date as of `today`.
    #[must_use]
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status.is_open() && self.due_date.is_some_and(|due| due < today)
    }
}

/// Reviewer verdict recorded on a corrective action.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ActionReview {
    pub reviewer_id: String,
    pub approved: bool,
    pub comments: Option<String>,
    pub reviewed_at: DateTime<Utc>,
}
