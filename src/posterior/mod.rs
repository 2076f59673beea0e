//! Reduction of posterior draws into estimates and summary tables.

pub mod reducer;
pub mod summary;

pub use reducer::reduce_change_points;
pub use summary::{summarize, ParameterSummary};
