//! Ordinary least squares with coefficient inference.
//!
//! We fit small regressions of the form:
//!
//! ```text
//! y_i = x_i^T β + ε_i,   ε_i ~ N(0, σ²)
//! ```
//!
//! and report per-coefficient standard errors, t statistics and two-sided
//! p-values alongside R².
//!
//! Implementation choices:
//! - Coefficients are solved by SVD, which is robust for tall design matrices.
//! - Singularity is detected *before* anything is inverted: too few rows, a
//!   condition number beyond `MAX_CONDITION`, or a failed Cholesky factorisation
//!   of `XᵀX` all report `SingularMatrix`.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::domain::{Measure, Undefined};
use crate::error::NumericalError;
use crate::math::hypothesis::t_two_sided_p;

const MAX_CONDITION: f64 = 1e10;

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }
    None
}

/// One estimated coefficient with its inference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    pub estimate: f64,
    pub std_error: Measure,
    pub t_stat: Measure,
    pub p_value: Measure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OlsFit {
    pub coefficients: Vec<Coefficient>,
    pub r_squared: Measure,
    /// Residual variance estimate `SSR / (n - p)`.
    pub sigma2: Measure,
    pub n: usize,
    pub df_resid: usize,
}

impl OlsFit {
    pub fn coefficient(&self, j: usize) -> Option<&Coefficient> {
        self.coefficients.get(j)
    }
}

fn check_conditioning(x: &DMatrix<f64>) -> Result<(), NumericalError> {
    let singular = || NumericalError::SingularMatrix {
        rows: x.nrows(),
        cols: x.ncols(),
    };
    if x.nrows() < x.ncols() || x.ncols() == 0 {
        return Err(singular());
    }
    let sv = x.singular_values();
    let max = sv.iter().copied().fold(0.0_f64, f64::max);
    let min = sv.iter().copied().fold(f64::INFINITY, f64::min);
    if !(max > 0.0) || !min.is_finite() || max / min.max(f64::MIN_POSITIVE) > MAX_CONDITION {
        return Err(singular());
    }
    Ok(())
}

/// Fit `y ~ X` and compute coefficient inference.
pub fn fit_ols(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<OlsFit, NumericalError> {
    let (n, p) = (x.nrows(), x.ncols());
    if y.len() != n {
        return Err(NumericalError::SingularMatrix { rows: n, cols: p });
    }
    check_conditioning(x)?;

    let xtx = x.transpose() * x;
    let chol = xtx
        .cholesky()
        .ok_or(NumericalError::SingularMatrix { rows: n, cols: p })?;
    let xtx_inv = chol.inverse();

    let beta = solve_least_squares(x, y).ok_or(NumericalError::SingularMatrix { rows: n, cols: p })?;

    let resid = y - x * &beta;
    let ssr = resid.dot(&resid);
    let y_bar = y.mean();
    let sst: f64 = y.iter().map(|v| (v - y_bar) * (v - y_bar)).sum();
    let r_squared = if sst > 0.0 {
        Measure::Defined(1.0 - ssr / sst)
    } else {
        Measure::Undefined(Undefined::ZeroVariance)
    };

    let df_resid = n - p;
    let sigma2 = if df_resid > 0 {
        Measure::Defined(ssr / df_resid as f64)
    } else {
        Measure::Undefined(Undefined::InsufficientData)
    };

    let coefficients = (0..p)
        .map(|j| {
            let estimate = beta[j];
            let std_error = sigma2.map(|s2| (s2 * xtx_inv[(j, j)]).max(0.0).sqrt());
            let t_stat = match std_error {
                Measure::Defined(se) if se > 0.0 => Measure::Defined(estimate / se),
                Measure::Defined(_) if estimate != 0.0 => Measure::Defined(estimate.signum() * f64::INFINITY),
                Measure::Defined(_) => Measure::Undefined(Undefined::ZeroVariance),
                undefined => undefined,
            };
            let p_value = match t_stat {
                Measure::Defined(t) => t_two_sided_p(t, df_resid as f64),
                undefined => undefined,
            };
            Coefficient {
                estimate,
                std_error,
                t_stat,
                p_value,
            }
        })
        .collect();

    Ok(OlsFit {
        coefficients,
        r_squared,
        sigma2,
        n,
        df_resid,
    })
}
