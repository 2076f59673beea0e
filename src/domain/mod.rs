//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - price/return observations and catalogued events
//! - change-point estimates, regime statistics and correlation records
//! - `Measure`, the defined-or-explained value carried by every statistic
//! - run configuration and pipeline stages

pub mod config;
pub mod measure;
pub mod types;

pub use config::*;
pub use measure::*;
pub use types::*;
