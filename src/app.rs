//! Top-level application orchestration.
//!
//! `src/main.rs` only sets up logging; this module is the real entry point that:
//! - parses CLI arguments
//! - loads prices and the event catalog
//! - runs the staged analysis pipeline
//! - prints the terminal report and writes optional exports

use chrono::NaiveDate;
use clap::Parser;
use log::info;

use crate::cli::{config_from_args, Cli, Command, EventsArgs, RunArgs, SimulateArgs};
use crate::data::{generate_prices, SyntheticConfig};
use crate::domain::EventCategory;
use crate::error::AppError;
use crate::events::EventCatalog;
use crate::sampler::MetropolisSampler;

pub mod pipeline;

/// Entry point for the `breaks` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => handle_run(&args),
        Command::Events(args) => handle_events(&args),
        Command::Simulate(args) => handle_simulate(&args),
    }
}

fn load_catalog(path: Option<&std::path::Path>) -> Result<EventCatalog, AppError> {
    match path {
        Some(path) => {
            let loaded = crate::io::load_events(path)?;
            info!(
                "loaded {} events from {} ({} rows skipped)",
                loaded.catalog.len(),
                path.display(),
                loaded.row_errors.len()
            );
            Ok(loaded.catalog)
        }
        None => Ok(EventCatalog::builtin()),
    }
}

fn handle_run(args: &RunArgs) -> Result<(), AppError> {
    let config = config_from_args(args);
    let loaded = crate::io::load_prices(&args.prices)?;
    info!(
        "read {} price rows from {} ({} skipped)",
        loaded.rows_read,
        args.prices.display(),
        loaded.row_errors.len()
    );
    let series = loaded.series.between(args.start, args.end);
    let catalog = load_catalog(args.events.as_deref())?;

    let session = pipeline::run_analysis(config, series, catalog, &MetropolisSampler::default())?;
    println!("{}", crate::report::format_run_summary(&session, args.top));
    Ok(())
}

fn handle_events(args: &EventsArgs) -> Result<(), AppError> {
    let mut catalog = load_catalog(args.events.as_deref())?;
    if let Some(category) = &args.category {
        catalog = catalog.by_category(&EventCategory::from_label(category));
    }
    if let Some(region) = &args.region {
        catalog = catalog.by_region(region);
    }
    if args.start.is_some() || args.end.is_some() {
        catalog = catalog.between(args.start.unwrap_or(NaiveDate::MIN), args.end.unwrap_or(NaiveDate::MAX));
    }

    println!("{}", crate::report::format_catalog(catalog.events(), &catalog.statistics()));

    if let Some(path) = &args.export {
        crate::io::write_catalog_csv(path, catalog.events())?;
        info!("wrote {} events to {}", catalog.len(), path.display());
    }
    Ok(())
}

fn handle_simulate(args: &SimulateArgs) -> Result<(), AppError> {
    let config = SyntheticConfig {
        days: args.days,
        start_price: args.start_price,
        seed: args.seed,
        ..SyntheticConfig::default()
    };
    let series = generate_prices(&config)?;
    crate::io::write_prices_csv(&args.out, &series)?;
    info!(
        "wrote {} synthetic prices ({} to {}) to {}",
        series.len(),
        series.first_date().map(|d| d.to_string()).unwrap_or_default(),
        series.last_date().map(|d| d.to_string()).unwrap_or_default(),
        args.out.display()
    );
    Ok(())
}
