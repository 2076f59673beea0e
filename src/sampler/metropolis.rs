//! Random-walk Metropolis-within-Gibbs sampler.
//!
//! Each iteration sweeps the parameters one at a time:
//!
//! - discrete locations: an integer random walk, mixed with an occasional uniform
//!   jump anywhere in the location's support (both proposals are symmetric)
//! - positive parameters (scales): a Gaussian walk on `ln x`, with the Jacobian term
//!   in the acceptance ratio
//! - everything else: a Gaussian walk
//!
//! Step sizes are tuned during the `tune` phase using the acceptance-rate ladder
//! popularised by PyMC's Metropolis step, then frozen. Chains are independent,
//! seeded from the budget seed plus the chain index, and run in parallel.
//!
//! A proposal whose log density evaluates to NaN after tuning is counted as a
//! divergence and rejected.

use log::debug;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::StandardNormal;
use rayon::prelude::*;

use crate::domain::{ReturnPoint, SamplerBudget};
use crate::error::{ChainFailure, SamplingError};
use crate::models::prior::Prior;
use crate::models::spec::{BoundModel, ParameterDecl, ParameterKind};
use crate::models::ChangePointModelSpec;
use crate::sampler::{ChainTrace, PosteriorDraws, PosteriorSampler};
use crate::series::returns::return_values;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetropolisSampler {
    /// Iterations between step-size updates while tuning.
    pub adapt_interval: usize,
    /// Probability that a location proposal is a uniform jump over its support.
    pub uniform_jump_prob: f64,
}

impl Default for MetropolisSampler {
    fn default() -> Self {
        Self {
            adapt_interval: 50,
            uniform_jump_prob: 0.1,
        }
    }
}

impl PosteriorSampler for MetropolisSampler {
    fn sample(
        &self,
        spec: &ChangePointModelSpec,
        returns: &[ReturnPoint],
        budget: &SamplerBudget,
    ) -> Result<PosteriorDraws, SamplingError> {
        if budget.draws == 0 {
            return Err(SamplingError::InvalidBudget("draws must be at least 1".into()));
        }
        if budget.chains == 0 {
            return Err(SamplingError::InvalidBudget("chains must be at least 1".into()));
        }

        let y = return_values(returns);
        let model = spec.bind(&y).map_err(|e| SamplingError::ChainsFailed {
            requested: budget.chains,
            completed: 0,
            failures: vec![ChainFailure {
                chain: 0,
                reason: e.to_string(),
            }],
        })?;

        let results: Vec<Result<ChainTrace, ChainFailure>> = (0..budget.chains)
            .into_par_iter()
            .map(|chain| self.run_chain(&model, chain, budget))
            .collect();

        let mut traces = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(trace) => traces.push(trace),
                Err(failure) => failures.push(failure),
            }
        }
        if !failures.is_empty() {
            return Err(SamplingError::ChainsFailed {
                requested: budget.chains,
                completed: traces.len(),
                failures,
            });
        }

        let names = model.parameters().iter().map(|d| d.name.clone()).collect();
        Ok(PosteriorDraws::from_traces(names, traces))
    }
}

/// Mutable per-chain state.
struct ChainState {
    theta: Vec<f64>,
    log_density: f64,
    steps: Vec<f64>,
    accepted: Vec<usize>,
    attempts: Vec<usize>,
}

fn chain_seed(seed: u64, chain: usize) -> u64 {
    seed.wrapping_add((chain as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

fn location_support(decl: &ParameterDecl) -> (usize, usize) {
    match decl.prior {
        Prior::DiscreteUniform { lower, upper } => (lower, upper),
        _ => (0, 1),
    }
}

/// Acceptance-rate ladder used to rescale a step size.
fn tune_factor(rate: f64) -> f64 {
    if rate < 0.001 {
        0.1
    } else if rate < 0.05 {
        0.5
    } else if rate < 0.2 {
        0.9
    } else if rate > 0.95 {
        10.0
    } else if rate > 0.75 {
        2.0
    } else if rate > 0.5 {
        1.1
    } else {
        1.0
    }
}

impl MetropolisSampler {
    fn initial_steps(&self, model: &BoundModel<'_>, theta: &[f64]) -> Vec<f64> {
        let decls = model.parameters();
        let typical_scale = decls
            .iter()
            .zip(theta)
            .find(|(d, _)| d.kind == ParameterKind::Scale)
            .map(|(_, &s)| s.abs().max(1e-3))
            .unwrap_or(0.1);
        decls
            .iter()
            .map(|d| match d.kind {
                ParameterKind::Location => {
                    let (lo, hi) = location_support(d);
                    ((hi - lo) as f64 / 20.0).max(1.0)
                }
                k if k.is_positive() => 0.1,
                _ => 0.1 * typical_scale,
            })
            .collect()
    }

    fn start(&self, model: &BoundModel<'_>, chain: usize, rng: &mut StdRng) -> Result<ChainState, ChainFailure> {
        let base = model.initial_point();
        let steps = self.initial_steps(model, &base);

        let mut theta = base.clone();
        if chain > 0 {
            for ((decl, x), step) in model.parameters().iter().zip(theta.iter_mut()).zip(&steps) {
                let z: f64 = rng.sample(StandardNormal);
                match decl.kind {
                    ParameterKind::Location => {
                        let (lo, hi) = location_support(decl);
                        let jittered = (*x + (z * step).round()).clamp(lo as f64, (hi - 1) as f64);
                        *x = jittered;
                    }
                    k if k.is_positive() => *x *= (0.1 * z).exp(),
                    _ => *x += step * z,
                }
            }
            if !model.log_posterior(&theta).is_finite() {
                theta = base;
            }
        }

        let log_density = model.log_posterior(&theta);
        if !log_density.is_finite() {
            return Err(ChainFailure {
                chain,
                reason: format!("initial point has non-finite log density ({log_density})"),
            });
        }
        let n = theta.len();
        Ok(ChainState {
            theta,
            log_density,
            steps,
            accepted: vec![0; n],
            attempts: vec![0; n],
        })
    }

    /// Returns true when the proposal produced a NaN density.
    fn update(&self, model: &BoundModel<'_>, state: &mut ChainState, p: usize, rng: &mut StdRng) -> bool {
        let decl = &model.parameters()[p];
        let current = state.theta[p];
        let mut log_jacobian = 0.0;

        let proposal = match decl.kind {
            ParameterKind::Location => {
                let (lo, hi) = location_support(decl);
                if rng.r#gen::<f64>() < self.uniform_jump_prob {
                    rng.gen_range(lo..hi) as f64
                } else {
                    let reach = state.steps[p].round().max(1.0) as i64;
                    let mut delta = rng.gen_range(-reach..=reach - 1);
                    if delta >= 0 {
                        delta += 1;
                    }
                    current + delta as f64
                }
            }
            k if k.is_positive() => {
                let z: f64 = rng.sample(StandardNormal);
                let step = state.steps[p] * z;
                log_jacobian = step;
                current * step.exp()
            }
            _ => {
                let z: f64 = rng.sample(StandardNormal);
                current + state.steps[p] * z
            }
        };

        state.theta[p] = proposal;
        let proposed = model.log_posterior(&state.theta);
        state.attempts[p] += 1;

        if proposed.is_nan() {
            state.theta[p] = current;
            return true;
        }
        let log_ratio = proposed - state.log_density + log_jacobian;
        if log_ratio >= 0.0 || rng.r#gen::<f64>().ln() < log_ratio {
            state.log_density = proposed;
            state.accepted[p] += 1;
        } else {
            state.theta[p] = current;
        }
        false
    }

    fn adapt(&self, model: &BoundModel<'_>, state: &mut ChainState) {
        for (p, decl) in model.parameters().iter().enumerate() {
            if state.attempts[p] == 0 {
                continue;
            }
            let rate = state.accepted[p] as f64 / state.attempts[p] as f64;
            let mut step = state.steps[p] * tune_factor(rate);
            if decl.prior.is_discrete() {
                let (lo, hi) = location_support(decl);
                step = step.clamp(1.0, ((hi - lo) as f64).max(1.0));
            }
            state.steps[p] = step;
            state.accepted[p] = 0;
            state.attempts[p] = 0;
        }
    }

    fn run_chain(&self, model: &BoundModel<'_>, chain: usize, budget: &SamplerBudget) -> Result<ChainTrace, ChainFailure> {
        let mut rng = StdRng::seed_from_u64(chain_seed(budget.seed, chain));
        let mut state = self.start(model, chain, &mut rng)?;
        let n_params = state.theta.len();
        let interval = self.adapt_interval.max(1);

        for iter in 0..budget.tune {
            for p in 0..n_params {
                self.update(model, &mut state, p, &mut rng);
            }
            if (iter + 1) % interval == 0 {
                self.adapt(model, &mut state);
            }
        }
        debug!("chain {chain}: tuned step sizes {:?}", state.steps);

        state.accepted.iter_mut().for_each(|a| *a = 0);
        state.attempts.iter_mut().for_each(|a| *a = 0);

        let mut samples = Vec::with_capacity(budget.draws);
        let mut divergences = 0;
        for _ in 0..budget.draws {
            for p in 0..n_params {
                if self.update(model, &mut state, p, &mut rng) {
                    divergences += 1;
                }
            }
            samples.push(state.theta.clone());
        }

        let acceptance = state
            .accepted
            .iter()
            .zip(&state.attempts)
            .map(|(&a, &n)| if n == 0 { 0.0 } else { a as f64 / n as f64 })
            .collect();

        Ok(ChainTrace {
            samples,
            divergences,
            acceptance,
        })
    }
}
