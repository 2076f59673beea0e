//! Cumulative impact: running deviation from the last pre-event price.

use serde::Serialize;

use crate::domain::{Measure, Undefined};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CumulativeImpact {
    /// Reference price (last pre-event close), when one exists.
    pub base_price: Measure,
    /// `% deviation from base` at each post-window offset.
    pub trajectory: Vec<f64>,
    pub max_impact: Measure,
    pub min_impact: Measure,
    pub final_impact: Measure,
}

pub fn cumulative_impact(before: &[f64], after: &[f64]) -> CumulativeImpact {
    let undefined = |reason| CumulativeImpact {
        base_price: Measure::Undefined(reason),
        trajectory: Vec::new(),
        max_impact: Measure::Undefined(reason),
        min_impact: Measure::Undefined(reason),
        final_impact: Measure::Undefined(reason),
    };
    let Some(&base) = before.last() else {
        return undefined(Undefined::InsufficientData);
    };
    if base == 0.0 {
        return undefined(Undefined::DivisionByZero);
    }
    if after.is_empty() {
        return CumulativeImpact {
            base_price: Measure::Defined(base),
            ..undefined(Undefined::InsufficientData)
        };
    }

    let trajectory: Vec<f64> = after.iter().map(|p| (p - base) / base * 100.0).collect();
    let fold = |init: f64, f: fn(f64, f64) -> f64| trajectory.iter().copied().fold(init, f);
    CumulativeImpact {
        base_price: Measure::Defined(base),
        max_impact: Measure::Defined(fold(f64::NEG_INFINITY, f64::max)),
        min_impact: Measure::Defined(fold(f64::INFINITY, f64::min)),
        final_impact: Measure::Defined(trajectory[trajectory.len() - 1]),
        trajectory,
    }
}
