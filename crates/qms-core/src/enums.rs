//! Status enums, taxonomies, entity types, and activity actions.
//!
//! All enums serialize as `SCREAMING_SNAKE_CASE` (`"IN_PROGRESS"`, `"HIGH"`), which is
//! also the textual label used in SQL storage and dashboard breakdowns.
//! Non-conformity status and corrective-action status are distinct types even
//! though their variants overlap.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Severity of a non-conformity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub const ALL: [Self; 3] = [Self::Low, Self::Medium, Self::High];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// NcStatus
// ---------------------------------------------------------------------------

/// Status of a non-conformity.
///
/// ```text
/// PENDING → IN_PROGRESS (first corrective action, or explicit)
/// any non-terminal → COMPLETED | CLOSED (closure preconditions enforced)
/// COMPLETED, CLOSED: sticky
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NcStatus {
    Pending,
    InProgress,
    Completed,
    Closed,
}

impl NcStatus {
    pub const ALL: [Self; 4] = [
        Self::Pending,
        Self::InProgress,
        Self::Completed,
        Self::Closed,
    ];

    /// Terminal states can only be re-asserted, never left.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Closed)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for NcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ActionStatus
// ---------------------------------------------------------------------------

/// Status of a corrective action.
///
/// Updated freely through `update_action_status`; the review operation moves
/// it to `COMPLETED` (approved) or back to `IN_PROGRESS` (rework).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    Pending,
    InProgress,
    Completed,
}

impl ActionStatus {
    #[must_use]
    pub const fn is_open(self) -> bool {
        !matches!(self, Self::Completed)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ConformityStatus
// ---------------------------------------------------------------------------

/// Outcome of evaluating one checklist clause within an audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConformityStatus {
    Compliant,
    NonCompliant,
    PartiallyCompliant,
    NotApplicable,
    PendingEvaluation,
}

impl ConformityStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Compliant => "COMPLIANT",
            Self::NonCompliant => "NON_COMPLIANT",
            Self::PartiallyCompliant => "PARTIALLY_COMPLIANT",
            Self::NotApplicable => "NOT_APPLICABLE",
            Self::PendingEvaluation => "PENDING_EVALUATION",
        }
    }
}

impl fmt::Display for ConformityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// AuditStatus
// ---------------------------------------------------------------------------

/// Status of an audit.
///
/// ```text
/// PLANNED → IN_PROGRESS → COMPLETED → CLOSED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    Planned,
    InProgress,
    Completed,
    Closed,
}

impl AuditStatus {
    pub const ALL: [Self; 4] = [
        Self::Planned,
        Self::InProgress,
        Self::Completed,
        Self::Closed,
    ];

    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Planned => &[Self::InProgress],
            Self::InProgress => &[Self::Completed],
            Self::Completed => &[Self::Closed],
            Self::Closed => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "PLANNED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Fixed set of caller roles supplied by the authentication capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Auditor,
    Reviewer,
    Auditee,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Auditor => "AUDITOR",
            Self::Reviewer => "REVIEWER",
            Self::Auditee => "AUDITEE",
        }
    }

    /// Parse a role label, case-insensitively.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Some(Self::Admin),
            "AUDITOR" => Some(Self::Auditor),
            "REVIEWER" => Some(Self::Reviewer),
            "AUDITEE" => Some(Self::Auditee),
            _ => None,
        }
    }

    /// Parse a comma-separated role list into a sorted set. Unknown labels
    /// are skipped.
    #[must_use]
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut roles: Vec<Self> = raw
            .split(',')
            .filter_map(|label| {
                let role = Self::parse(label);
                if role.is_none() && !label.trim().is_empty() {
                    tracing::debug!(label = label.trim(), "ignoring unknown role");
                }
                role
            })
            .collect();
        roles.sort_unstable();
        roles.dedup();
        roles
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// MappingRelation
// ---------------------------------------------------------------------------

/// How two clauses from different standards relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MappingRelation {
    Equivalent,
    Partial,
    Related,
}

impl MappingRelation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equivalent => "EQUIVALENT",
            Self::Partial => "PARTIAL",
            Self::Related => "RELATED",
        }
    }
}

impl fmt::Display for MappingRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EntityType
// ---------------------------------------------------------------------------

/// Entity kinds, used by the activity log and error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    User,
    Standard,
    Clause,
    ClauseMapping,
    Audit,
    Checklist,
    ChecklistItem,
    Instance,
    NonConformity,
    CorrectiveAction,
    RcaStep,
    Document,
}

impl EntityType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Standard => "standard",
            Self::Clause => "clause",
            Self::ClauseMapping => "clause_mapping",
            Self::Audit => "audit",
            Self::Checklist => "checklist",
            Self::ChecklistItem => "checklist_item",
            Self::Instance => "instance",
            Self::NonConformity => "non_conformity",
            Self::CorrectiveAction => "corrective_action",
            Self::RcaStep => "rca_step",
            Self::Document => "document",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ActivityAction
// ---------------------------------------------------------------------------

/// Kind of mutation recorded in the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Created,
    Updated,
    StatusChanged,
    ActionAdded,
    ActionReviewed,
    RcaSubmitted,
    Closed,
    Evaluated,
    Linked,
}

impl ActivityAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::StatusChanged => "status_changed",
            Self::ActionAdded => "action_added",
            Self::ActionReviewed => "action_reviewed",
            Self::RcaSubmitted => "rca_submitted",
            Self::Closed => "closed",
            Self::Evaluated => "evaluated",
            Self::Linked => "linked",
        }
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
