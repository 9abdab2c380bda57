//! Dense monthly trend series.
//!
//! Charts rely on one bucket per calendar month with no gaps, so the window is
//! laid out first (all zeros) and observed counts are overlaid afterwards.

use chrono::{Datelike, NaiveDate};

use qms_core::responses::TrendPoint;

pub const MIN_TREND_MONTHS: u32 = 1;
pub const MAX_TREND_MONTHS: u32 = 36;

/// Clamp a requested window to `[MIN_TREND_MONTHS, MAX_TREND_MONTHS]`.
#[must_use]
pub fn clamp_months(months: i64) -> u32 {
    let clamped = months.clamp(i64::from(MIN_TREND_MONTHS), i64::from(MAX_TREND_MONTHS));
    u32::try_from(clamped).unwrap_or(MAX_TREND_MONTHS)
}

/// Months since year 0, so month arithmetic is plain integer arithmetic.
#[allow(clippy::cast_possible_wrap)]
fn month_index(date: NaiveDate) -> i32 {
    date.year() * 12 + date.month0() as i32
}

fn period_label(index: i32) -> String {
    format!("{:04}-{:02}", index.div_euclid(12), index.rem_euclid(12) + 1)
}

/// First day of the oldest month in a `months`-long window ending with `today`'s month.
#[must_use]
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub fn window_start(today: NaiveDate, months: u32) -> NaiveDate {
    let months = clamp_months(i64::from(months));
    let first = month_index(today) - months as i32 + 1;
    NaiveDate::from_ymd_opt(first.div_euclid(12), first.rem_euclid(12) as u32 + 1, 1)
        .unwrap_or(today)
}

/// Build the trailing `months` window ending with `today`'s month, oldest first,
/// with `observed` `(YYYY-MM, count)` rows overlaid. Rows outside the window are
/// ignored.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn dense_monthly_trend<I>(today: NaiveDate, months: i64, observed: I) -> Vec<TrendPoint>
where
    I: IntoIterator<Item = (String, u64)>,
{
    let months = clamp_months(months);
    let last = month_index(today);
    let first = last - months as i32 + 1;

    let mut points: Vec<TrendPoint> = (first..=last)
        .map(|index| TrendPoint {
            period: period_label(index),
            count: 0,
        })
        .collect();

    for (period, count) in observed {
        if let Some(point) = points.iter_mut().find(|p| p.period == period) {
            point.count += count;
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case(-5, 1)]
    #[case(0, 1)]
    #[case(1, 1)]
    #[case(12, 12)]
    #[case(36, 36)]
    #[case(120, 36)]
    fn months_are_clamped(#[case] requested: i64, #[case] expected: u32) {
        assert_eq!(clamp_months(requested), expected);
    }

    #[test]
    fn empty_window_is_dense_and_zero() {
        let trend = dense_monthly_trend(date(2026, 10, 16), 6, std::iter::empty());
        let periods: Vec<&str> = trend.iter().map(|p| p.period.as_str()).collect();
        assert_eq!(
            periods,
            ["2026-05", "2026-06", "2026-07", "2026-08", "2026-09", "2026-10"]
        );
        assert!(trend.iter().all(|p| p.count == 0));
    }

    #[test]
    fn window_crosses_year_boundary() {
        let trend = dense_monthly_trend(date(2026, 2, 1), 4, std::iter::empty());
        let periods: Vec<&str> = trend.iter().map(|p| p.period.as_str()).collect();
        assert_eq!(periods, ["2025-11", "2025-12", "2026-01", "2026-02"]);
    }

    #[test]
    fn observed_counts_overlay_and_outsiders_drop() {
        let observed = vec![
            ("2026-09".to_string(), 3),
            ("2024-01".to_string(), 99),
            ("2026-10".to_string(), 1),
        ];
        let trend = dense_monthly_trend(date(2026, 10, 16), 3, observed);
        let counts: Vec<u64> = trend.iter().map(|p| p.count).collect();
        assert_eq!(counts, [0, 3, 1]);
    }

    #[test]
    fn window_start_is_first_of_oldest_month() {
        assert_eq!(window_start(date(2026, 10, 16), 6), date(2026, 5, 1));
        assert_eq!(window_start(date(2026, 1, 31), 1), date(2026, 1, 1));
        assert_eq!(window_start(date(2026, 1, 31), 2), date(2025, 12, 1));
    }
}
