//! Posterior sampling backends.
//!
//! The pipeline talks to a backend through [`PosteriorSampler`]: hand it a model
//! spec, the observed returns and a budget, get back [`PosteriorDraws`]. The built-in
//! backend is [`MetropolisSampler`]; tests may substitute their own.

pub mod metropolis;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{ReturnPoint, SamplerBudget};
use crate::error::SamplingError;
use crate::models::ChangePointModelSpec;

pub use metropolis::MetropolisSampler;

pub trait PosteriorSampler {
    fn sample(
        &self,
        spec: &ChangePointModelSpec,
        returns: &[ReturnPoint],
        budget: &SamplerBudget,
    ) -> Result<PosteriorDraws, SamplingError>;
}

/// One chain's output: `samples[draw][parameter]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainTrace {
    pub samples: Vec<Vec<f64>>,
    pub divergences: usize,
    /// Post-tuning acceptance rate per parameter.
    pub acceptance: Vec<f64>,
}

/// Posterior draws for every declared parameter across all chains.
///
/// Stored parameter-major (`values[parameter][chain][draw]`) since every consumer
/// reads one parameter at a time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PosteriorDraws {
    names: Vec<String>,
    values: Vec<Vec<Vec<f64>>>,
    divergences: Vec<usize>,
    acceptance: BTreeMap<String, f64>,
}

impl PosteriorDraws {
    pub fn from_traces(names: Vec<String>, traces: Vec<ChainTrace>) -> Self {
        let n_params = names.len();
        let mut values = vec![Vec::with_capacity(traces.len()); n_params];
        let mut acceptance_sum = vec![0.0; n_params];
        let mut divergences = Vec::with_capacity(traces.len());

        for trace in &traces {
            for (p, chains) in values.iter_mut().enumerate() {
                chains.push(trace.samples.iter().map(|draw| draw[p]).collect());
            }
            for (p, rate) in trace.acceptance.iter().enumerate().take(n_params) {
                acceptance_sum[p] += rate;
            }
            divergences.push(trace.divergences);
        }

        let n_chains = traces.len().max(1) as f64;
        let acceptance = names
            .iter()
            .cloned()
            .zip(acceptance_sum.into_iter().map(|s| s / n_chains))
            .collect();

        Self {
            names,
            values,
            divergences,
            acceptance,
        }
    }

    /// Build directly from `chains[chain][draw]` per parameter, with no divergences.
    pub fn from_parameter_chains(parameters: Vec<(String, Vec<Vec<f64>>)>) -> Self {
        let n_chains = parameters.first().map(|(_, c)| c.len()).unwrap_or(0);
        let (names, values): (Vec<_>, Vec<_>) = parameters.into_iter().unzip();
        Self {
            acceptance: names.iter().map(|n| (n.clone(), 1.0)).collect(),
            names,
            values,
            divergences: vec![0; n_chains],
        }
    }

    pub fn parameter_names(&self) -> &[String] {
        &self.names
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn chains(&self, name: &str) -> Option<&[Vec<f64>]> {
        self.position(name).map(|p| self.values[p].as_slice())
    }

    /// All chains of one parameter concatenated.
    pub fn flattened(&self, name: &str) -> Option<Vec<f64>> {
        self.chains(name).map(|chains| chains.concat())
    }

    pub fn n_chains(&self) -> usize {
        self.divergences.len()
    }

    pub fn n_draws(&self) -> usize {
        self.values
            .first()
            .and_then(|chains| chains.first())
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn divergences(&self) -> &[usize] {
        &self.divergences
    }

    pub fn total_divergences(&self) -> usize {
        self.divergences.iter().sum()
    }

    pub fn acceptance_rate(&self, name: &str) -> Option<f64> {
        self.acceptance.get(name).copied()
    }

    /// Per draw, the values of `names` in order: `out[flat_draw][i]`.
    pub fn joint(&self, names: &[String]) -> Option<Vec<Vec<f64>>> {
        let columns: Vec<Vec<f64>> = names.iter().map(|n| self.flattened(n)).collect::<Option<_>>()?;
        let len = columns.first().map(Vec::len).unwrap_or(0);
        Some((0..len).map(|d| columns.iter().map(|c| c[d]).collect()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traces_are_transposed_per_parameter() {
        let names = vec!["tau".to_string(), "mu_1".to_string()];
        let traces = vec![
            ChainTrace {
                samples: vec![vec![3.0, 0.1], vec![4.0, 0.2]],
                divergences: 1,
                acceptance: vec![0.5, 0.3],
            },
            ChainTrace {
                samples: vec![vec![5.0, 0.3], vec![6.0, 0.4]],
                divergences: 0,
                acceptance: vec![0.3, 0.5],
            },
        ];
        let draws = PosteriorDraws::from_traces(names, traces);
        assert_eq!(draws.n_chains(), 2);
        assert_eq!(draws.n_draws(), 2);
        assert_eq!(draws.chains("tau").unwrap()[1], vec![5.0, 6.0]);
        assert_eq!(draws.flattened("mu_1").unwrap(), vec![0.1, 0.2, 0.3, 0.4]);
        assert_eq!(draws.total_divergences(), 1);
        assert!((draws.acceptance_rate("tau").unwrap() - 0.4).abs() < 1e-12);
        assert_eq!(draws.joint(&["tau".to_string(), "mu_1".to_string()]).unwrap()[2], vec![5.0, 0.3]);
        assert!(draws.flattened("sigma").is_none());
    }
}
