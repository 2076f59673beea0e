//! `price-breaks` library crate.
//!
//! Bayesian change-point detection on Brent log returns, matching of detected breaks
//! to a catalog of geopolitical and economic events, and per-event impact statistics.
//!
//! The binary (`breaks`) is a thin wrapper around this library so the pipeline is
//! testable without spawning processes.

pub mod app;
pub mod cli;
pub mod data;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod events;
pub mod impact;
pub mod io;
pub mod math;
pub mod models;
pub mod posterior;
pub mod report;
pub mod sampler;
pub mod series;
