//! Per-audit evaluation progress.

use qms_core::enums::ConformityStatus;
use qms_core::responses::AuditProgress;

use crate::percentage;

/// Roll up the conformity status of every instance of one audit.
///
/// Total counts every instance; evaluated counts those whose status is set.
#[must_use]
pub fn audit_progress<I>(statuses: I) -> AuditProgress
where
    I: IntoIterator<Item = Option<ConformityStatus>>,
{
    let (total, evaluated) = statuses
        .into_iter()
        .fold((0u64, 0u64), |(total, evaluated), status| {
            (total + 1, evaluated + u64::from(status.is_some()))
        });

    AuditProgress {
        total_clauses: total,
        evaluated_clauses: evaluated,
        completion_percentage: percentage(evaluated, total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_audit_has_zero_completion() {
        let progress = audit_progress(std::iter::empty());
        assert_eq!(progress.total_clauses, 0);
        assert_eq!(progress.evaluated_clauses, 0);
        assert!(progress.completion_percentage.abs() < f64::EPSILON);
    }

    #[test]
    fn counts_any_set_status_as_evaluated() {
        let progress = audit_progress([
            Some(ConformityStatus::Compliant),
            None,
            Some(ConformityStatus::PendingEvaluation),
            None,
        ]);
        assert_eq!(progress.total_clauses, 4);
        assert_eq!(progress.evaluated_clauses, 2);
        assert!((progress.completion_percentage - 50.0).abs() < f64::EPSILON);
    }
}
