//! Per-parameter posterior summary table.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::diagnostics::ConvergenceReport;
use crate::domain::{Measure, Undefined};
use crate::math::stats::{mean, percentile_sorted, sample_std, sorted};
use crate::models::Prior;
use crate::sampler::PosteriorDraws;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSummary {
    pub name: String,
    pub mean: f64,
    pub sd: Measure,
    pub q5: f64,
    pub q95: f64,
    pub rhat: Measure,
    pub ess: Measure,
    /// Post-tuning acceptance rate averaged over chains.
    pub acceptance_rate: Option<f64>,
    pub prior: Option<String>,
}

/// One row per parameter, in declaration order. Diagnostics missing from `report`
/// are undefined.
pub fn summarize(
    draws: &PosteriorDraws,
    report: &ConvergenceReport,
    priors: &BTreeMap<String, Prior>,
) -> Vec<ParameterSummary> {
    draws
        .parameter_names()
        .iter()
        .filter_map(|name| {
            let values = draws.flattened(name)?;
            let s = sorted(&values);
            let diag = report.parameter(name);
            Some(ParameterSummary {
                name: name.clone(),
                mean: mean(&values)?,
                sd: sample_std(&values).map_or(Measure::Undefined(Undefined::InsufficientData), Measure::Defined),
                q5: percentile_sorted(&s, 5.0)?,
                q95: percentile_sorted(&s, 95.0)?,
                rhat: diag.map_or(Measure::Undefined(Undefined::InsufficientData), |d| d.rhat),
                ess: diag.map_or(Measure::Undefined(Undefined::InsufficientData), |d| d.ess),
                acceptance_rate: draws.acceptance_rate(name),
                prior: priors.get(name).map(Prior::describe),
            })
        })
        .collect()
}
