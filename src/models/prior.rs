//! Prior distributions declared by change-point models.
//!
//! A prior is a *descriptor*: it can validate itself and evaluate a log density, but
//! it does not draw samples. Hierarchical priors name the parameters that supply
//! their location and scale instead of fixing them.

use serde::{Deserialize, Serialize};

use crate::error::ModelSpecError;

const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dist", rename_all = "snake_case")]
pub enum Prior {
    Normal { mu: f64, sigma: f64 },
    HalfNormal { sigma: f64 },
    /// Uniform over the integers in `[lower, upper)`.
    DiscreteUniform { lower: usize, upper: usize },
    /// `Normal(loc, scale)` where both come from other parameters.
    Hierarchical { loc: String, scale: String },
}

impl Prior {
    pub fn standard_normal() -> Self {
        Prior::Normal { mu: 0.0, sigma: 1.0 }
    }

    pub fn is_discrete(&self) -> bool {
        matches!(self, Prior::DiscreteUniform { .. })
    }

    pub fn validate(&self, parameter: &str) -> Result<(), ModelSpecError> {
        let invalid = |reason: String| ModelSpecError::InvalidPrior {
            parameter: parameter.to_string(),
            reason,
        };
        match self {
            Prior::Normal { mu, sigma } => {
                if !mu.is_finite() {
                    return Err(invalid(format!("location {mu} is not finite")));
                }
                if !(sigma.is_finite() && *sigma > 0.0) {
                    return Err(invalid(format!("scale {sigma} must be positive")));
                }
            }
            Prior::HalfNormal { sigma } => {
                if !(sigma.is_finite() && *sigma > 0.0) {
                    return Err(invalid(format!("scale {sigma} must be positive")));
                }
            }
            Prior::DiscreteUniform { lower, upper } => {
                if lower >= upper {
                    return Err(invalid(format!("empty support [{lower}, {upper})")));
                }
            }
            Prior::Hierarchical { loc, scale } => {
                if loc.is_empty() || scale.is_empty() {
                    return Err(invalid("hierarchical prior needs named hyperparameters".into()));
                }
            }
        }
        Ok(())
    }

    /// Log density at `x` with fixed parameters; `-inf` outside the support.
    ///
    /// Hierarchical priors must be evaluated with [`Prior::log_density_given`].
    pub fn log_density(&self, x: f64) -> f64 {
        match self {
            Prior::Normal { mu, sigma } => normal_ln_pdf(x, *mu, *sigma),
            Prior::HalfNormal { sigma } => {
                if x < 0.0 {
                    f64::NEG_INFINITY
                } else {
                    normal_ln_pdf(x, 0.0, *sigma) + std::f64::consts::LN_2
                }
            }
            Prior::DiscreteUniform { lower, upper } => {
                let (lo, hi) = (*lower as f64, *upper as f64);
                if x >= lo && x < hi && x.fract() == 0.0 {
                    -(hi - lo).ln()
                } else {
                    f64::NEG_INFINITY
                }
            }
            Prior::Hierarchical { .. } => f64::NAN,
        }
    }

    pub fn log_density_given(&self, x: f64, loc: f64, scale: f64) -> f64 {
        match self {
            Prior::Hierarchical { .. } => normal_ln_pdf(x, loc, scale),
            other => other.log_density(x),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Prior::Normal { mu, sigma } => format!("Normal({mu}, {sigma})"),
            Prior::HalfNormal { sigma } => format!("HalfNormal({sigma})"),
            Prior::DiscreteUniform { lower, upper } => format!("DiscreteUniform[{lower}, {upper})"),
            Prior::Hierarchical { loc, scale } => format!("Normal({loc}, {scale})"),
        }
    }
}

pub(crate) fn normal_ln_pdf(x: f64, mu: f64, sigma: f64) -> f64 {
    if !(sigma > 0.0) {
        return f64::NEG_INFINITY;
    }
    let z = (x - mu) / sigma;
    -LN_SQRT_2PI - sigma.ln() - 0.5 * z * z
}
