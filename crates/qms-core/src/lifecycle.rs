//! Non-conformity lifecycle rules.
//!
//! Pure checks shared by every path that mutates an NC. The database layer
//! loads the aggregate, asks these functions what is allowed, and only then
//! writes. Nothing here performs I/O.

use crate::entities::{CorrectiveAction, NonConformity, RcaStepInput};
use crate::enums::{ActionStatus, NcStatus, Severity};
use crate::errors::CoreError;

/// Fewest steps an RCA submission may carry.
pub const RCA_MIN_STEPS: usize = 3;
/// Most steps an RCA submission may carry.
pub const RCA_MAX_STEPS: usize = 5;
/// RCA steps a HIGH-severity NC needs before it can be closed.
pub const HIGH_SEVERITY_MIN_RCA_STEPS: usize = 3;

/// Trim `value` and reject it when nothing is left.
///
/// # Errors
///
/// Returns `CoreError::Validation` naming `field` when the value is blank.
pub fn require_non_blank(field: &str, value: &str) -> Result<String, CoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(format!("{field} must not be blank")));
    }
    Ok(trimmed.to_string())
}

/// Trim an optional free-text field, mapping blank to `None`.
#[must_use]
pub fn normalize_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Validate an RCA submission as a whole.
///
/// The count must be within `RCA_MIN_STEPS..=RCA_MAX_STEPS`, each declared
/// step number must equal its 1-based position, and every why-text must be
/// non-blank.
///
/// # Errors
///
/// Returns `CoreError::Validation` describing the first violation found.
pub fn validate_rca_steps(steps: &[RcaStepInput]) -> Result<Vec<RcaStepInput>, CoreError> {
    if !(RCA_MIN_STEPS..=RCA_MAX_STEPS).contains(&steps.len()) {
        return Err(CoreError::Validation(format!(
            "RCA requires between {RCA_MIN_STEPS} and {RCA_MAX_STEPS} steps, got {}",
            steps.len()
        )));
    }

    let mut normalized = Vec::with_capacity(steps.len());
    for (position, step) in (1u32..).zip(steps) {
        if step.step_number != position {
            return Err(CoreError::Validation(format!(
                "RCA steps must be numbered sequentially from 1: expected step {position}, got {}",
                step.step_number
            )));
        }
        let why_text = require_non_blank(&format!("whyText of step {position}"), &step.why_text)?;
        normalized.push(RcaStepInput {
            step_number: position,
            why_text,
        });
    }
    Ok(normalized)
}

/// Domain preconditions of closure, excluding the already-closed check.
///
/// Checked in order: HIGH severity needs enough RCA steps, then every
/// corrective action must be `COMPLETED`.
///
/// # Errors
///
/// Returns `CoreError::Validation` for the first unmet precondition.
pub fn check_closure_preconditions(
    severity: Severity,
    actions: &[CorrectiveAction],
    rca_step_count: usize,
) -> Result<(), CoreError> {
    if severity == Severity::High && rca_step_count < HIGH_SEVERITY_MIN_RCA_STEPS {
        return Err(CoreError::Validation(format!(
            "HIGH severity non-conformities require at least {HIGH_SEVERITY_MIN_RCA_STEPS} RCA steps before closure, found {rca_step_count}"
        )));
    }

    let open: Vec<&str> = actions
        .iter()
        .filter(|a| a.status != ActionStatus::Completed)
        .map(|a| a.id.as_str())
        .collect();
    if !open.is_empty() {
        return Err(CoreError::Validation(format!(
            "all corrective actions must be COMPLETED before closure; still open: {}",
            open.join(", ")
        )));
    }
    Ok(())
}

/// Full closure check for `close_nc`. First failure wins.
///
/// # Errors
///
/// Returns `CoreError::Conflict` when the NC is already terminal, otherwise
/// whatever `check_closure_preconditions` reports.
pub fn check_closable(
    nc: &NonConformity,
    actions: &[CorrectiveAction],
    rca_step_count: usize,
) -> Result<(), CoreError> {
    if nc.status.is_terminal() {
        return Err(CoreError::Conflict(format!(
            "non-conformity {} is already closed ({})",
            nc.id, nc.status
        )));
    }
    check_closure_preconditions(nc.severity, actions, rca_step_count)
}

/// What an explicit status update amounts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// Terminal status re-asserted; nothing to write.
    Unchanged,
    /// Plain field update between non-terminal states.
    Direct,
    /// Entering a terminal state; closure preconditions must hold first.
    Guarded,
}

/// Classify `current → target` for `update_nc_status`.
///
/// # Errors
///
/// Returns `CoreError::Conflict` when leaving a terminal state.
pub fn plan_status_change(
    nc_id: &str,
    current: NcStatus,
    target: NcStatus,
) -> Result<StatusChange, CoreError> {
    if current.is_terminal() {
        if current == target {
            return Ok(StatusChange::Unchanged);
        }
        return Err(CoreError::Conflict(format!(
            "non-conformity {nc_id} is {current}; cannot change status to {target}"
        )));
    }
    if target.is_terminal() {
        Ok(StatusChange::Guarded)
    } else {
        Ok(StatusChange::Direct)
    }
}

/// Status an NC moves to once a corrective action is added.
#[must_use]
pub const fn status_after_action_added(current: NcStatus) -> NcStatus {
    match current {
        NcStatus::Pending => NcStatus::InProgress,
        other => other,
    }
}

/// Action status resulting from a review verdict.
#[must_use]
pub const fn status_after_review(approved: bool) -> ActionStatus {
    if approved {
        ActionStatus::Completed
    } else {
        ActionStatus::InProgress
    }
}
