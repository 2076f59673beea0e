//! Sampler health checks.
//!
//! Per parameter we compute:
//! - split R-hat (potential scale reduction over half-chains)
//! - effective sample size by Geyer's initial monotone sequence
//!
//! and count divergences across chains. A parameter passes when
//! `rhat < rhat_threshold` (strict) and `ess >= min_ess`; the run is converged when
//! every parameter passes and no divergence occurred.
//!
//! Non-convergence never blocks the pipeline. It is reported as a list of
//! [`ConvergenceWarning`]s the caller may act on. A diagnostic that cannot be computed
//! (chains too short) is `Undefined` and counts as not converged.

use serde::Serialize;

use crate::domain::{Measure, Undefined};
use crate::sampler::PosteriorDraws;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    pub rhat: f64,
    pub min_ess: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            rhat: 1.1,
            min_ess: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterDiagnostics {
    pub name: String,
    pub rhat: Measure,
    pub ess: Measure,
    pub converged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConvergenceWarning {
    HighRhat { parameter: String, rhat: Measure, threshold: f64 },
    LowEss { parameter: String, ess: f64, minimum: f64 },
    UndefinedDiagnostic { parameter: String, diagnostic: &'static str, reason: Undefined },
    Divergences { count: usize },
}

impl std::fmt::Display for ConvergenceWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConvergenceWarning::HighRhat { parameter, rhat, threshold } => {
                write!(f, "{parameter}: R-hat {rhat:.4} is not below {threshold}")
            }
            ConvergenceWarning::LowEss { parameter, ess, minimum } => {
                write!(f, "{parameter}: effective sample size {ess:.1} is below {minimum}")
            }
            ConvergenceWarning::UndefinedDiagnostic { parameter, diagnostic, reason } => {
                write!(f, "{parameter}: {diagnostic} is undefined ({reason})")
            }
            ConvergenceWarning::Divergences { count } => write!(f, "{count} divergent transitions"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergenceReport {
    pub parameters: Vec<ParameterDiagnostics>,
    pub divergences: usize,
    pub thresholds: Thresholds,
    pub converged: bool,
    pub warnings: Vec<ConvergenceWarning>,
}

impl ConvergenceReport {
    pub fn parameter(&self, name: &str) -> Option<&ParameterDiagnostics> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// Strict threshold: exactly `threshold` is *not* converged.
pub fn rhat_converged(rhat: f64, threshold: f64) -> bool {
    rhat < threshold
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

fn variance(xs: &[f64]) -> f64 {
    let m = mean(xs);
    xs.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / (xs.len() as f64 - 1.0)
}

/// Split every chain into two halves (dropping the middle draw of odd chains).
fn split_chains(chains: &[Vec<f64>]) -> Vec<&[f64]> {
    let mut out = Vec::with_capacity(chains.len() * 2);
    for chain in chains {
        let half = chain.len() / 2;
        out.push(&chain[..half]);
        out.push(&chain[chain.len() - half..]);
    }
    out
}

/// Potential scale reduction from chains of equal length.
///
/// Constant chains that agree give 1; constant chains that disagree give infinity.
/// Fewer than two chains or two draws per chain is insufficient data.
pub fn rhat_of(chains: &[&[f64]]) -> Measure {
    let m = chains.len();
    let n = chains.iter().map(|c| c.len()).min().unwrap_or(0);
    if m < 2 || n < 2 {
        return Measure::Undefined(Undefined::InsufficientData);
    }
    let means: Vec<f64> = chains.iter().map(|c| mean(&c[..n])).collect();
    let w = chains.iter().map(|c| variance(&c[..n])).sum::<f64>() / m as f64;
    let b_over_n = variance(&means);

    if w == 0.0 {
        return Measure::Defined(if b_over_n == 0.0 { 1.0 } else { f64::INFINITY });
    }
    let nf = n as f64;
    let var_plus = (nf - 1.0) / nf * w + b_over_n;
    Measure::Defined((var_plus / w).sqrt())
}

/// Split R-hat of one parameter; needs at least 4 draws per chain.
pub fn split_rhat(chains: &[Vec<f64>]) -> Measure {
    rhat_of(&split_chains(chains))
}

fn autocovariance(chain: &[f64], chain_mean: f64, lag: usize) -> f64 {
    let n = chain.len();
    if lag >= n {
        return 0.0;
    }
    let sum: f64 = (0..n - lag)
        .map(|i| (chain[i] - chain_mean) * (chain[i + lag] - chain_mean))
        .sum();
    sum / n as f64
}

/// Effective sample size over all chains (Geyer initial monotone sequence).
///
/// Chains that are constant and agree report the full draw count; constant chains
/// that disagree have no defined ESS.
pub fn effective_sample_size(chains: &[Vec<f64>]) -> Measure {
    let m = chains.len();
    let n = chains.iter().map(Vec::len).min().unwrap_or(0);
    if m == 0 || n < 4 {
        return Measure::Undefined(Undefined::InsufficientData);
    }
    let total = (m * n) as f64;
    let chains: Vec<&[f64]> = chains.iter().map(|c| &c[..n]).collect();
    let means: Vec<f64> = chains.iter().map(|c| mean(c)).collect();
    let w = chains.iter().map(|c| variance(c)).sum::<f64>() / m as f64;
    let b_over_n = if m > 1 { variance(&means) } else { 0.0 };

    if w == 0.0 {
        return if b_over_n == 0.0 {
            Measure::Defined(total)
        } else {
            Measure::Undefined(Undefined::ZeroVariance)
        };
    }
    let nf = n as f64;
    let var_plus = (nf - 1.0) / nf * w + b_over_n;

    let rho = |lag: usize| -> f64 {
        let acov = chains
            .iter()
            .zip(&means)
            .map(|(c, &cm)| autocovariance(c, cm, lag))
            .sum::<f64>()
            / m as f64;
        1.0 - (w - acov) / var_plus
    };

    // Sum of adjacent pairs, truncated at the first non-positive pair and forced
    // to be non-increasing.
    let mut tau = -1.0;
    let mut previous_pair = f64::INFINITY;
    let mut lag = 0;
    while lag + 1 < n {
        let pair = if lag == 0 { 1.0 + rho(1) } else { rho(lag) + rho(lag + 1) };
        if pair <= 0.0 {
            break;
        }
        let pair = pair.min(previous_pair);
        tau += 2.0 * pair;
        previous_pair = pair;
        lag += 2;
    }

    let tau = tau.max(1.0 / total.log10());
    Measure::Defined(total / tau)
}

pub fn check_convergence(draws: &PosteriorDraws, thresholds: Thresholds) -> ConvergenceReport {
    let mut parameters = Vec::with_capacity(draws.parameter_names().len());
    let mut warnings = Vec::new();

    for name in draws.parameter_names() {
        let Some(chains) = draws.chains(name) else {
            continue;
        };
        let rhat = split_rhat(chains);
        let ess = effective_sample_size(chains);
        let rhat_ok = rhat.value().is_some_and(|r| rhat_converged(r, thresholds.rhat));
        let ess_ok = ess.value().is_some_and(|e| e >= thresholds.min_ess);
        match rhat {
            Measure::Undefined(reason) => warnings.push(ConvergenceWarning::UndefinedDiagnostic {
                parameter: name.clone(),
                diagnostic: "R-hat",
                reason,
            }),
            Measure::Defined(_) if !rhat_ok => warnings.push(ConvergenceWarning::HighRhat {
                parameter: name.clone(),
                rhat,
                threshold: thresholds.rhat,
            }),
            Measure::Defined(_) => {}
        }
        match ess {
            Measure::Undefined(reason) => warnings.push(ConvergenceWarning::UndefinedDiagnostic {
                parameter: name.clone(),
                diagnostic: "effective sample size",
                reason,
            }),
            Measure::Defined(e) if !ess_ok => warnings.push(ConvergenceWarning::LowEss {
                parameter: name.clone(),
                ess: e,
                minimum: thresholds.min_ess,
            }),
            Measure::Defined(_) => {}
        }
        parameters.push(ParameterDiagnostics {
            name: name.clone(),
            rhat,
            ess,
            converged: rhat_ok && ess_ok,
        });
    }

    let divergences = draws.total_divergences();
    if divergences > 0 {
        warnings.push(ConvergenceWarning::Divergences { count: divergences });
    }
    let converged = divergences == 0 && parameters.iter().all(|p| p.converged);

    ConvergenceReport {
        parameters,
        divergences,
        thresholds,
        converged,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use rand::prelude::*;
    use rand::rngs::StdRng;
    use rand_distr::StandardNormal;

    use super::*;

    fn noise_chain(seed: u64, n: usize, offset: f64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| offset + rng.sample::<f64, _>(StandardNormal)).collect()
    }

    #[test]
    fn threshold_is_exclusive() {
        assert!(!rhat_converged(1.1, 1.1));
        assert!(rhat_converged(1.099999, 1.1));
        assert!(!rhat_converged(f64::NAN, 1.1));
    }

    #[test]
    fn constant_chains() {
        assert_eq!(split_rhat(&[vec![3.0; 10], vec![3.0; 10]]), Measure::Defined(1.0));
        assert_eq!(split_rhat(&[vec![3.0; 10], vec![4.0; 10]]), Measure::Defined(f64::INFINITY));
        assert_eq!(effective_sample_size(&[vec![3.0; 10], vec![3.0; 10]]), Measure::Defined(20.0));
        assert_eq!(
            effective_sample_size(&[vec![3.0; 10], vec![4.0; 10]]),
            Measure::Undefined(Undefined::ZeroVariance)
        );
    }

    #[test]
    fn mixed_chains_converge() {
        let chains = vec![noise_chain(1, 1000, 0.0), noise_chain(2, 1000, 0.0)];
        let rhat = split_rhat(&chains).value().unwrap();
        assert!(rhat < 1.01, "rhat {rhat}");
        let ess = effective_sample_size(&chains).value().unwrap();
        assert!(ess > 1000.0 && ess < 3000.0, "ess {ess}");
    }

    #[test]
    fn separated_chains_do_not_converge() {
        let chains = vec![noise_chain(1, 500, 0.0), noise_chain(2, 500, 5.0)];
        assert!(split_rhat(&chains).value().unwrap() > 1.5);
    }

    #[test]
    fn sticky_chain_has_low_ess() {
        // Each value repeated 20 times: strongly autocorrelated.
        let base = noise_chain(9, 50, 0.0);
        let sticky: Vec<f64> = base.iter().flat_map(|v| std::iter::repeat(*v).take(20)).collect();
        let ess = effective_sample_size(&[sticky.clone(), sticky.iter().rev().copied().collect()])
            .value()
            .unwrap();
        assert!(ess < 300.0, "ess {ess}");
    }

    #[test]
    fn report_collects_warnings() {
        let draws = PosteriorDraws::from_parameter_chains(vec![
            ("good".into(), vec![noise_chain(1, 400, 0.0), noise_chain(2, 400, 0.0)]),
            ("bad".into(), vec![noise_chain(3, 400, 0.0), noise_chain(4, 400, 8.0)]),
        ]);
        let report = check_convergence(&draws, Thresholds::default());
        assert!(!report.converged);
        assert!(report.parameter("good").unwrap().converged);
        assert!(!report.parameter("bad").unwrap().converged);
        assert!(report
            .warnings
            .iter()
            .any(|w| matches!(w, ConvergenceWarning::HighRhat { parameter, .. } if parameter == "bad")));
    }

    #[test]
    fn two_draws_leave_diagnostics_undefined() {
        let chains = vec![vec![1.0, 2.0], vec![1.0, 2.0]];
        assert_eq!(split_rhat(&chains), Measure::Undefined(Undefined::InsufficientData));
        assert_eq!(effective_sample_size(&chains), Measure::Undefined(Undefined::InsufficientData));

        let draws = PosteriorDraws::from_parameter_chains(vec![("tau".into(), chains)]);
        let report = check_convergence(&draws, Thresholds::default());
        assert!(!report.converged);
        let tau = report.parameter("tau").unwrap();
        assert!(!tau.converged);
        assert_eq!(tau.rhat, Measure::Undefined(Undefined::InsufficientData));
        assert!(report.warnings.iter().any(|w| matches!(
            w,
            ConvergenceWarning::UndefinedDiagnostic { diagnostic: "R-hat", reason: Undefined::InsufficientData, .. }
        )));

        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("null"));
        assert!(json.contains(r#""rhat":"insufficient_data""#));
    }
}
