//! Deterministic synthetic data for demos and tests.

pub mod synthetic;

pub use synthetic::{generate_prices, trading_days, Regime, SyntheticConfig};
