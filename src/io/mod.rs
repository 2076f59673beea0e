//! Input/output helpers.
//!
//! - price and event CSV ingest (`ingest`)
//! - result tables as CSV (`export`)
//! - the run summary document (`run_json`)

pub mod export;
pub mod ingest;
pub mod run_json;

pub use export::*;
pub use ingest::*;
pub use run_json::*;
