//! Per-event and cross-event significance tests.

use serde::Serialize;

use crate::domain::Measure;
use crate::math::hypothesis::{cohens_d, one_sample_t_test, shapiro_wilk, two_sample_t_test, wilcoxon_signed_rank, TestResult};

/// Tests comparing one event's post window against its pre window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EventSignificance {
    /// Two-sample t-test on price levels, statistic sign is `post - pre`.
    pub t_test: TestResult,
    /// Paired signed-rank test over `post[j] - pre[j]` aligned by offset.
    pub wilcoxon: TestResult,
    pub cohens_d: Measure,
}

/// Post-minus-pre differences, pairing the first `m` post prices with the last `m`
/// pre prices where `m = min(len)`.
pub fn paired_differences(before: &[f64], after: &[f64]) -> Vec<f64> {
    let m = before.len().min(after.len());
    let pre = &before[before.len() - m..];
    after[..m].iter().zip(pre).map(|(a, b)| a - b).collect()
}

pub fn event_significance(before: &[f64], after: &[f64]) -> EventSignificance {
    let diffs = paired_differences(before, after);
    EventSignificance {
        t_test: two_sample_t_test(after, before),
        wilcoxon: wilcoxon_signed_rank(&diffs),
        cohens_d: cohens_d(&diffs),
    }
}

/// Tests over the per-event price changes of a whole batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AggregateSignificance {
    pub n_events: usize,
    /// One-sample t-test of mean change against zero.
    pub t_test: TestResult,
    pub wilcoxon: TestResult,
    pub normality: TestResult,
    pub cohens_d: Measure,
}

pub fn aggregate_significance(price_changes_pct: &[f64]) -> AggregateSignificance {
    AggregateSignificance {
        n_events: price_changes_pct.len(),
        t_test: one_sample_t_test(price_changes_pct, 0.0),
        wilcoxon: wilcoxon_signed_rank(price_changes_pct),
        normality: shapiro_wilk(price_changes_pct),
        cohens_d: cohens_d(price_changes_pct),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Undefined;

    #[test]
    fn differences_align_by_offset() {
        let d = paired_differences(&[1.0, 2.0, 3.0, 4.0], &[10.0, 20.0]);
        assert_eq!(d, vec![7.0, 16.0]);
        assert!(paired_differences(&[], &[1.0]).is_empty());
    }

    #[test]
    fn step_change_is_significant() {
        let s = event_significance(&[100.0, 100.0, 100.0], &[120.0, 120.0, 120.0]);
        assert_eq!(s.t_test.statistic, Measure::Defined(f64::INFINITY));
        assert_eq!(s.t_test.p_value, Measure::Defined(0.0));
        assert!(s.t_test.significant(0.05));
        // three tied differences: normal approximation
        assert!(s.wilcoxon.p_value.is_defined());
        assert_eq!(s.cohens_d, Measure::Undefined(Undefined::ZeroVariance));
    }

    #[test]
    fn flat_windows_are_not_significant() {
        let s = event_significance(&[50.0, 50.0], &[50.0, 50.0]);
        assert!(!s.t_test.significant(0.05));
        assert_eq!(s.wilcoxon.p_value, Measure::Undefined(Undefined::AllZeroDifferences));
    }

    #[test]
    fn aggregate_over_mixed_changes() {
        let changes = [12.0, -4.0, 8.5, 20.1, -1.2, 6.0, 3.3];
        let agg = aggregate_significance(&changes);
        assert_eq!(agg.n_events, 7);
        assert!(agg.t_test.p_value.is_defined());
        assert!(agg.normality.p_value.is_defined());
        assert!(agg.cohens_d.value().unwrap() > 0.0);
        assert!(!aggregate_significance(&[1.0, 2.0]).normality.p_value.is_defined());
    }
}
