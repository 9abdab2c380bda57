//! Label → count breakdowns.

use qms_core::responses::{Breakdown, UNKNOWN_LABEL};

/// Count occurrences of each key, mapping `None` to `UNKNOWN`.
#[must_use]
pub fn breakdown<I, S>(keys: I) -> Breakdown
where
    I: IntoIterator<Item = Option<S>>,
    S: AsRef<str>,
{
    let mut counts = Breakdown::new();
    for key in keys {
        let label = key.as_ref().map_or(UNKNOWN_LABEL, |k| k.as_ref());
        *counts.entry(label.to_string()).or_default() += 1;
    }
    counts
}

/// Merge pre-grouped `(label, count)` rows over a zero-filled set of labels.
///
/// Every label in `labels` appears in the result even when no row mentions it.
#[must_use]
pub fn seeded_breakdown<I>(labels: &[&str], rows: I) -> Breakdown
where
    I: IntoIterator<Item = (Option<String>, u64)>,
{
    let mut counts: Breakdown = labels.iter().map(|l| ((*l).to_string(), 0)).collect();
    for (label, count) in rows {
        let label = label.unwrap_or_else(|| UNKNOWN_LABEL.to_string());
        *counts.entry(label).or_default() += count;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn null_keys_become_unknown() {
        let counts = breakdown([Some("Quality"), None, Some("Quality"), None, None]);
        assert_eq!(counts.get("Quality"), Some(&2));
        assert_eq!(counts.get(UNKNOWN_LABEL), Some(&3));
    }

    #[test]
    fn seeded_labels_start_at_zero() {
        let counts = seeded_breakdown(
            &["LOW", "MEDIUM", "HIGH"],
            [(Some("HIGH".to_string()), 4), (None, 1)],
        );
        let expected: Breakdown = [
            ("HIGH".to_string(), 4),
            ("LOW".to_string(), 0),
            ("MEDIUM".to_string(), 0),
            (UNKNOWN_LABEL.to_string(), 1),
        ]
        .into_iter()
        .collect();
        assert_eq!(counts, expected);
    }
}
