//! Command-line parsing for the `breaks` binary.
//!
//! Argument parsing stays here; command dispatch lives in [`crate::app`].

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::domain::{AnalysisConfig, ModelChoice};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "breaks", version, about = "Bayesian change points and event impacts for Brent prices")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Detect change points, match them to events and quantify event impacts.
    Run(RunArgs),
    /// List, filter and export the event catalog.
    Events(EventsArgs),
    /// Write a synthetic price CSV with injected breaks.
    Simulate(SimulateArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct RunArgs {
    /// Price CSV with `Date` and `Price` columns.
    #[arg(long, value_name = "CSV")]
    pub prices: PathBuf,

    /// Event CSV; the built-in catalog is used when omitted.
    #[arg(long, value_name = "CSV")]
    pub events: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = ModelChoice::EventAugmented)]
    pub model: ModelChoice,

    /// Number of change points (smallest candidate when --max-changepoints is set).
    #[arg(long, default_value_t = 1)]
    pub changepoints: usize,

    /// Fit every count up to this one and choose by BIC.
    #[arg(long)]
    pub max_changepoints: Option<usize>,

    /// Period length in years for the hierarchical model.
    #[arg(long, default_value_t = 10)]
    pub period_years: u32,

    /// Give every regime its own return scale.
    #[arg(long)]
    pub regime_scales: bool,

    #[arg(long, default_value_t = 2000)]
    pub draws: usize,

    #[arg(long, default_value_t = 1000)]
    pub tune: usize,

    #[arg(long, default_value_t = 2)]
    pub chains: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Trading days on each side of an event.
    #[arg(long, default_value_t = 30)]
    pub window_days: usize,

    /// Maximum calendar days between a change point and a matched event.
    #[arg(long, default_value_t = 30)]
    pub tolerance_days: u32,

    /// p-value below which an event counts as significant.
    #[arg(long, default_value_t = 0.05)]
    pub significance: f64,

    #[arg(long, default_value_t = 1.1)]
    pub rhat_threshold: f64,

    #[arg(long, default_value_t = 100.0)]
    pub min_ess: f64,

    /// Directory for CSV and JSON results.
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Drop prices before this date (YYYY-MM-DD).
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Drop prices after this date (YYYY-MM-DD).
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Rows shown in the ranking and correlation tables.
    #[arg(long, default_value_t = 10)]
    pub top: usize,
}

#[derive(Debug, Parser, Clone)]
pub struct EventsArgs {
    /// Event CSV; the built-in catalog is used when omitted.
    #[arg(long, value_name = "CSV")]
    pub events: Option<PathBuf>,

    /// Keep one category (e.g. `opec`, `conflict`, `Military Conflict`).
    #[arg(long)]
    pub category: Option<String>,

    /// Keep one region (case-insensitive).
    #[arg(long)]
    pub region: Option<String>,

    #[arg(long)]
    pub start: Option<NaiveDate>,

    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Write the filtered catalog to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct SimulateArgs {
    /// Trading days to generate.
    #[arg(long, default_value_t = 750)]
    pub days: usize,

    #[arg(long, default_value_t = 65.0)]
    pub start_price: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Output CSV path.
    #[arg(long, value_name = "CSV")]
    pub out: PathBuf,
}

pub fn config_from_args(args: &RunArgs) -> AnalysisConfig {
    AnalysisConfig {
        model: args.model,
        n_changepoints: args.changepoints,
        max_changepoints: args.max_changepoints,
        period_years: args.period_years,
        regime_scales: args.regime_scales,
        draws: args.draws,
        tune: args.tune,
        chains: args.chains,
        seed: args.seed,
        window_days: args.window_days,
        tolerance_days: args.tolerance_days,
        significance_threshold: args.significance,
        rhat_threshold: args.rhat_threshold,
        min_ess: args.min_ess,
        out_dir: args.out.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_defaults_match_config_defaults() {
        let cli = Cli::parse_from(["breaks", "run", "--prices", "brent.csv"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(config_from_args(&args), AnalysisConfig::default());
    }

    #[test]
    fn run_flags_map_into_config() {
        let cli = Cli::parse_from([
            "breaks",
            "run",
            "--prices",
            "brent.csv",
            "--model",
            "multiple",
            "--changepoints",
            "2",
            "--max-changepoints",
            "4",
            "--start",
            "2010-01-01",
            "--out",
            "results",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        let config = config_from_args(&args);
        assert_eq!(config.model, ModelChoice::Multiple);
        assert_eq!(config.changepoint_range(), vec![2, 3, 4]);
        assert_eq!(config.out_dir, Some(PathBuf::from("results")));
        assert_eq!(args.start, NaiveDate::from_ymd_opt(2010, 1, 1));
    }

    #[test]
    fn simulate_requires_output() {
        assert!(Cli::try_parse_from(["breaks", "simulate"]).is_err());
    }
}
