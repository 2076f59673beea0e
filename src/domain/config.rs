//! Run configuration as understood by the pipeline.
//!
//! Derived from CLI flags (plus defaults); library callers can build it directly.

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Which change-point model family to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ModelChoice {
    /// One break, two regimes.
    Single,
    /// `n_changepoints` breaks, `n_changepoints + 1` regimes.
    Multiple,
    /// Multiple breaks plus an event-day fixed effect.
    EventAugmented,
    /// One break per calendar period with partially pooled period means.
    Hierarchical,
}

/// Posterior sampling budget handed to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerBudget {
    pub draws: usize,
    pub tune: usize,
    pub chains: usize,
    pub seed: u64,
}

/// A full run's configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub model: ModelChoice,
    pub n_changepoints: usize,
    /// When larger than `n_changepoints`, every k in between is fitted and the
    /// number of breaks is chosen by BIC.
    pub max_changepoints: Option<usize>,
    /// Calendar bucket size for the hierarchical model.
    pub period_years: u32,
    /// Per-regime scales instead of one shared scale.
    pub regime_scales: bool,

    pub draws: usize,
    pub tune: usize,
    pub chains: usize,
    pub seed: u64,

    pub window_days: usize,
    pub tolerance_days: u32,
    pub significance_threshold: f64,

    pub rhat_threshold: f64,
    pub min_ess: f64,

    pub out_dir: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: ModelChoice::EventAugmented,
            n_changepoints: 1,
            max_changepoints: None,
            period_years: 10,
            regime_scales: false,
            draws: 2000,
            tune: 1000,
            chains: 2,
            seed: 42,
            window_days: 30,
            tolerance_days: 30,
            significance_threshold: 0.05,
            rhat_threshold: 1.1,
            min_ess: 100.0,
            out_dir: None,
        }
    }
}

impl AnalysisConfig {
    pub fn budget(&self) -> SamplerBudget {
        SamplerBudget {
            draws: self.draws,
            tune: self.tune,
            chains: self.chains,
            seed: self.seed,
        }
    }

    /// Candidate break counts, smallest first.
    pub fn changepoint_range(&self) -> Vec<usize> {
        let lo = self.n_changepoints;
        let hi = self.max_changepoints.unwrap_or(lo).max(lo);
        (lo..=hi).collect()
    }
}
