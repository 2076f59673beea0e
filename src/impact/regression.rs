//! Event regressions: `y = b0 + b1 * indicator + b2 * t`.

use nalgebra::{DMatrix, DVector};
use serde::Serialize;

use crate::domain::{Measure, Undefined};
use crate::error::NumericalError;
use crate::math::fit_ols;

/// Coefficient on the event indicator together with the fit quality.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EventRegression {
    pub effect: Measure,
    pub std_error: Measure,
    pub t_stat: Measure,
    pub p_value: Measure,
    pub r_squared: Measure,
    /// R² of the same regression without the indicator column.
    pub r_squared_without_event: Measure,
    pub observations: usize,
}

impl EventRegression {
    pub(crate) fn undefined(reason: Undefined, observations: usize) -> Self {
        let u = Measure::Undefined(reason);
        Self {
            effect: u,
            std_error: u,
            t_stat: u,
            p_value: u,
            r_squared: u,
            r_squared_without_event: u,
            observations,
        }
    }
}

fn design(indicator: &[f64], with_event: bool) -> DMatrix<f64> {
    let n = indicator.len();
    let cols = if with_event { 3 } else { 2 };
    DMatrix::from_fn(n, cols, |i, j| match (j, with_event) {
        (0, _) => 1.0,
        (1, true) => indicator[i],
        _ => i as f64,
    })
}

/// OLS of `y` on `[1, indicator, t]`.
///
/// A singular design (too few rows, or an indicator that is constant or collinear
/// with the trend) is reported as an error before any inversion.
pub fn regress_on_indicator(y: &[f64], indicator: &[f64]) -> Result<EventRegression, NumericalError> {
    let n = y.len();
    if indicator.len() != n {
        return Err(NumericalError::SingularMatrix { rows: n, cols: 3 });
    }
    let yv = DVector::from_column_slice(y);
    let full = fit_ols(&design(indicator, true), &yv)?;
    let reduced = fit_ols(&design(indicator, false), &yv)
        .map(|fit| fit.r_squared)
        .unwrap_or(Measure::Undefined(Undefined::SingularMatrix));

    let coef = full
        .coefficient(1)
        .ok_or(NumericalError::SingularMatrix { rows: n, cols: 3 })?;
    Ok(EventRegression {
        effect: Measure::Defined(coef.estimate),
        std_error: coef.std_error,
        t_stat: coef.t_stat,
        p_value: coef.p_value,
        r_squared: full.r_squared,
        r_squared_without_event: reduced,
        observations: n,
    })
}

/// Level-shift regression on a local price window: the `before` prices get
/// indicator 0 and the `after` prices indicator 1.
///
/// A singular fit comes back as an all-undefined record rather than an error so one
/// degenerate event does not abort the batch.
pub fn step_regression(before: &[f64], after: &[f64]) -> EventRegression {
    let y: Vec<f64> = before.iter().chain(after).copied().collect();
    let indicator: Vec<f64> = before
        .iter()
        .map(|_| 0.0)
        .chain(after.iter().map(|_| 1.0))
        .collect();
    match regress_on_indicator(&y, &indicator) {
        Ok(fit) => fit,
        Err(NumericalError::SingularMatrix { .. }) => EventRegression::undefined(Undefined::SingularMatrix, y.len()),
        Err(_) => EventRegression::undefined(Undefined::ZeroVariance, y.len()),
    }
}
