//! Mathematical utilities: descriptive statistics, least squares and hypothesis tests.

pub mod hypothesis;
pub mod ols;
pub mod stats;

pub use ols::*;
