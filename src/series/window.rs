//! Before/after windows and the statistics computed over them.
//!
//! Windows are half-open: "before" is `[at - width, at)` and "after" is
//! `[at, at + width)`, both truncated at the sequence boundaries. Truncation never
//! fails; an empty window simply produces undefined statistics.

use std::ops::Range;

use chrono::NaiveDate;

use crate::domain::{Measure, RegimeStats, Undefined};
use crate::math::stats;

pub fn before(len: usize, at: usize, width: usize) -> Range<usize> {
    let end = at.min(len);
    end.saturating_sub(width)..end
}

pub fn after(len: usize, at: usize, width: usize) -> Range<usize> {
    let start = at.min(len);
    start..start.saturating_add(width).min(len)
}

/// Index of the date closest to `target`; on a tie the earlier date wins.
pub fn nearest_index(dates: &[NaiveDate], target: NaiveDate) -> Option<usize> {
    if dates.is_empty() {
        return None;
    }
    let idx = dates.partition_point(|d| *d < target);
    if idx == 0 {
        return Some(0);
    }
    if idx == dates.len() {
        return Some(dates.len() - 1);
    }
    let below = (target - dates[idx - 1]).num_days();
    let above = (dates[idx] - target).num_days();
    Some(if above < below { idx } else { idx - 1 })
}

fn measure(value: Option<f64>) -> Measure {
    match value {
        Some(v) if v.is_finite() => Measure::Defined(v),
        Some(_) => Measure::Undefined(Undefined::ZeroVariance),
        None => Measure::Undefined(Undefined::InsufficientData),
    }
}

/// Descriptive statistics of one window.
///
/// `log_returns` are the returns falling inside the same window; their sample
/// standard deviation is reported as `mean_volatility`.
pub fn regime_stats(prices: &[f64], log_returns: &[f64]) -> RegimeStats {
    RegimeStats {
        observations: prices.len(),
        mean_price: measure(stats::mean(prices)),
        std_price: measure(stats::sample_std(prices)),
        min_price: measure(stats::min(prices)),
        max_price: measure(stats::max(prices)),
        mean_volatility: measure(stats::sample_std(log_returns)),
        trend: measure(stats::linear_slope(prices)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn windows_truncate_at_boundaries() {
        assert_eq!(before(100, 0, 30), 0..0);
        assert_eq!(before(100, 10, 30), 0..10);
        assert_eq!(before(100, 50, 30), 20..50);
        assert_eq!(after(100, 90, 30), 90..100);
        assert_eq!(after(100, 120, 30), 100..100);
    }

    #[test]
    fn empty_window_is_insufficient_not_zero() {
        let s = regime_stats(&[], &[]);
        assert_eq!(s.observations, 0);
        assert_eq!(s.mean_price, Measure::Undefined(Undefined::InsufficientData));
        assert_eq!(s.trend, Measure::Undefined(Undefined::InsufficientData));
    }

    #[test]
    fn stats_of_rising_window() {
        let s = regime_stats(&[10.0, 11.0, 12.0, 13.0], &[0.01, 0.03, 0.02]);
        assert_eq!(s.mean_price, Measure::Defined(11.5));
        assert_eq!(s.min_price, Measure::Defined(10.0));
        assert!((s.trend.value().unwrap() - 1.0).abs() < 1e-12);
        assert!((s.mean_volatility.value().unwrap() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn nearest_prefers_earlier_on_tie() {
        let dates = [d(2024, 1, 5), d(2024, 1, 8)];
        assert_eq!(nearest_index(&dates, d(2024, 1, 6)), Some(0));
        assert_eq!(nearest_index(&dates, d(2024, 1, 7)), Some(1));
        // Saturday target between Friday and Sunday-dated rows
        assert_eq!(nearest_index(&[d(2024, 1, 5), d(2024, 1, 7)], d(2024, 1, 6)), Some(0));
        assert_eq!(nearest_index(&dates, d(2023, 1, 1)), Some(0));
        assert_eq!(nearest_index(&dates, d(2025, 1, 1)), Some(1));
        assert_eq!(nearest_index(&[], d(2025, 1, 1)), None);
    }
}
