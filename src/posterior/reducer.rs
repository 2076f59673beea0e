//! Posterior draws → change-point estimates.
//!
//! For each location parameter:
//! - point estimate: median of the flattened draws, rounded, clamped to `[0, N-1]`
//! - credible interval: 5th / 95th percentiles, each rounded, clamped and dated
//! - regime statistics over `window` returns before and after the estimate
//!
//! With several locations every draw's location vector is sorted first, so the
//! j-th estimate summarises the j-th earliest break regardless of label switching.

use crate::domain::{ChangePointEstimate, ReturnPoint};
use crate::error::{AnalysisError, DataError, ModelSpecError};
use crate::math::stats::{percentile_sorted, sorted};
use crate::models::ChangePointModelSpec;
use crate::sampler::PosteriorDraws;
use crate::series::window::{after, before, regime_stats};

pub const CREDIBLE_LOW: f64 = 5.0;
pub const CREDIBLE_HIGH: f64 = 95.0;

fn to_index(value: f64, n: usize) -> usize {
    if !(value > 0.0) {
        return 0;
    }
    (value.round() as usize).min(n - 1)
}

/// Location draws per break, `out[j]` = all draws of the j-th break.
fn location_columns(spec: &ChangePointModelSpec, draws: &PosteriorDraws) -> Result<Vec<Vec<f64>>, ModelSpecError> {
    let names = spec.location_names();
    let joint = draws.joint(&names).ok_or(ModelSpecError::ParameterLength {
        expected: spec.n_parameters(),
        actual: draws.parameter_names().len(),
    })?;
    let order_stats = !matches!(spec, ChangePointModelSpec::Hierarchical(_));

    let mut columns = vec![Vec::with_capacity(joint.len()); names.len()];
    for mut row in joint {
        if order_stats {
            row.sort_by(|a, b| a.total_cmp(b));
        }
        for (j, v) in row.into_iter().enumerate() {
            columns[j].push(v);
        }
    }
    Ok(columns)
}

/// Reduce posterior draws to one estimate per change point, earliest first.
///
/// `prices` must be aligned with `returns` (price on each return's date).
pub fn reduce_change_points(
    spec: &ChangePointModelSpec,
    draws: &PosteriorDraws,
    returns: &[ReturnPoint],
    prices: &[f64],
    window: usize,
) -> Result<Vec<ChangePointEstimate>, AnalysisError> {
    let n = returns.len();
    if n == 0 || prices.len() != n {
        return Err(DataError::InsufficientData {
            required: 1,
            actual: n.min(prices.len()),
        }
        .into());
    }
    let log_returns: Vec<f64> = returns.iter().map(|r| r.log_return).collect();
    let names = spec.location_names();
    let columns = location_columns(spec, draws)?;

    let mut estimates = Vec::with_capacity(columns.len());
    for (name, column) in names.into_iter().zip(columns) {
        let column = sorted(&column);
        let (Some(med), Some(lo), Some(hi)) = (
            percentile_sorted(&column, 50.0),
            percentile_sorted(&column, CREDIBLE_LOW),
            percentile_sorted(&column, CREDIBLE_HIGH),
        ) else {
            return Err(DataError::InsufficientData { required: 1, actual: 0 }.into());
        };
        let index = to_index(med, n);
        let (lo, hi) = (to_index(lo, n), to_index(hi, n));

        let b = before(n, index, window);
        let a = after(n, index, window);
        estimates.push(ChangePointEstimate {
            parameter: name,
            index,
            date: returns[index].date,
            credible_indices: (lo, hi),
            credible_interval: (returns[lo].date, returns[hi].date),
            before_stats: regime_stats(&prices[b.clone()], &log_returns[b]),
            after_stats: regime_stats(&prices[a.clone()], &log_returns[a]),
        });
    }
    estimates.sort_by_key(|e| e.index);
    Ok(estimates)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::domain::{Measure, Undefined};
    use crate::models::spec::{PriorScales, ScaleLayout, SegmentedSpec};

    fn returns(n: usize) -> (Vec<ReturnPoint>, Vec<f64>) {
        let start = NaiveDate::from_ymd_opt(2010, 1, 1).unwrap();
        let r = (0..n)
            .map(|i| ReturnPoint {
                date: start + chrono::Days::new(i as u64),
                log_return: if i % 2 == 0 { 0.01 } else { -0.01 },
            })
            .collect();
        let p = (0..n).map(|i| if i < n / 2 { 50.0 } else { 60.0 }).collect();
        (r, p)
    }

    fn spec(n: usize, k: usize) -> ChangePointModelSpec {
        ChangePointModelSpec::Multiple(SegmentedSpec {
            n_obs: n,
            n_changepoints: k,
            scales: ScaleLayout::Shared,
            priors: PriorScales::default(),
        })
    }

    fn single_draws(name: &str, values: Vec<f64>) -> PosteriorDraws {
        PosteriorDraws::from_parameter_chains(vec![(name.to_string(), vec![values])])
    }

    #[test]
    fn median_and_interval() {
        let (r, p) = returns(100);
        let draws = single_draws("tau", (40..=60).map(|v| v as f64).collect());
        let est = reduce_change_points(&spec(100, 1), &draws, &r, &p, 30).unwrap();
        assert_eq!(est.len(), 1);
        assert_eq!(est[0].index, 50);
        assert_eq!(est[0].credible_indices, (41, 59));
        assert_eq!(est[0].date, r[50].date);
        assert_eq!(est[0].before_stats.mean_price, Measure::Defined(50.0));
        assert_eq!(est[0].after_stats.mean_price, Measure::Defined(60.0));
        assert!((est[0].price_change_pct().value().unwrap() - 20.0).abs() < 1e-12);
    }

    #[test]
    fn estimate_at_zero_has_empty_before_window() {
        let (r, p) = returns(20);
        let draws = single_draws("tau", vec![0.0, 0.0, 0.0]);
        let est = reduce_change_points(&spec(20, 1), &draws, &r, &p, 30).unwrap();
        assert_eq!(est[0].index, 0);
        assert_eq!(est[0].before_stats.observations, 0);
        assert_eq!(est[0].before_stats.mean_price, Measure::Undefined(Undefined::InsufficientData));
        assert_eq!(est[0].price_change_pct(), Measure::Undefined(Undefined::InsufficientData));
        assert_eq!(est[0].after_stats.observations, 20);
    }

    #[test]
    fn draws_beyond_range_are_clamped() {
        let (r, p) = returns(10);
        let draws = single_draws("tau", vec![25.0, 25.0, -3.0]);
        let est = reduce_change_points(&spec(10, 1), &draws, &r, &p, 5).unwrap();
        assert_eq!(est[0].index, 9);
        assert_eq!(est[0].credible_indices.0, 0);
    }

    #[test]
    fn label_switching_is_removed() {
        let (r, p) = returns(100);
        let draws = PosteriorDraws::from_parameter_chains(vec![
            ("tau_1".into(), vec![vec![20.0, 70.0, 20.0, 70.0]]),
            ("tau_2".into(), vec![vec![70.0, 20.0, 70.0, 20.0]]),
        ]);
        let est = reduce_change_points(&spec(100, 2), &draws, &r, &p, 10).unwrap();
        assert_eq!(est.iter().map(|e| e.index).collect::<Vec<_>>(), vec![20, 70]);
    }
}
