//! # qms-metrics
//!
//! Aggregation over read-only snapshots of audit data.
//!
//! Every function here is pure: callers load the rows they need (or build
//! them in tests) and pass them in. Nothing reaches into a shared persistence
//! context, so the aggregates are recomputed on demand and cost one pass over
//! their inputs.

pub mod breakdown;
pub mod compliance;
pub mod progress;
pub mod trend;

pub use breakdown::{breakdown, seeded_breakdown};
pub use compliance::{AuditRecord, ChecklistRecord, ItemRecord, compute_compliance};
pub use progress::audit_progress;
pub use trend::{MAX_TREND_MONTHS, MIN_TREND_MONTHS, clamp_months, dense_monthly_trend, window_start};

/// `part / whole × 100`, or `0.0` when `whole` is zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_of_zero_is_zero() {
        assert!(percentage(0, 0).abs() < f64::EPSILON);
        assert!(percentage(5, 0).abs() < f64::EPSILON);
    }

    #[test]
    fn percentage_basic() {
        assert!((percentage(1, 4) - 25.0).abs() < f64::EPSILON);
        assert!((percentage(3, 3) - 100.0).abs() < f64::EPSILON);
    }
}
