//! Synthetic daily price series with injected structural breaks.
//!
//! Prices follow a geometric random walk on weekdays. Each [`Regime`] sets the daily
//! log drift and volatility from its start index onward, and an optional jump shifts
//! the level once at the regime boundary. Output is fully determined by the seed.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

use crate::domain::PricePoint;
use crate::error::DataError;
use crate::series::PriceSeries;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Regime {
    /// First trading-day index governed by this regime.
    pub start: usize,
    pub drift: f64,
    pub volatility: f64,
    /// Log jump applied on the first day of the regime.
    pub jump: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub start_date: NaiveDate,
    pub days: usize,
    pub start_price: f64,
    pub seed: u64,
    pub regimes: Vec<Regime>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2019, 1, 2).unwrap_or_default(),
            days: 750,
            start_price: 65.0,
            seed: 42,
            regimes: vec![
                Regime {
                    start: 0,
                    drift: 0.0002,
                    volatility: 0.015,
                    jump: 0.0,
                },
                Regime {
                    start: 300,
                    drift: -0.001,
                    volatility: 0.035,
                    jump: -0.25,
                },
                Regime {
                    start: 550,
                    drift: 0.0008,
                    volatility: 0.02,
                    jump: 0.1,
                },
            ],
        }
    }
}

/// Weekdays starting at `start` (or the next weekday when `start` falls on a weekend).
pub fn trading_days(start: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(count);
    let mut day = start;
    while out.len() < count {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            out.push(day);
        }
        match day.checked_add_days(Days::new(1)) {
            Some(next) => day = next,
            None => break,
        }
    }
    out
}

fn validate(config: &SyntheticConfig) -> Result<(), DataError> {
    if config.days < 2 {
        return Err(DataError::InvalidParameter("days must be at least 2".into()));
    }
    if !(config.start_price > 0.0 && config.start_price.is_finite()) {
        return Err(DataError::InvalidParameter("start price must be positive".into()));
    }
    if config.regimes.first().is_none_or(|r| r.start != 0) {
        return Err(DataError::InvalidParameter("the first regime must start at index 0".into()));
    }
    if config.regimes.windows(2).any(|w| w[1].start <= w[0].start) {
        return Err(DataError::InvalidParameter("regime starts must be strictly increasing".into()));
    }
    for r in &config.regimes {
        if !(r.volatility >= 0.0 && r.volatility.is_finite() && r.drift.is_finite() && r.jump.is_finite()) {
            return Err(DataError::InvalidParameter(format!(
                "regime at {} has a non-finite or negative parameter",
                r.start
            )));
        }
    }
    Ok(())
}

pub fn generate_prices(config: &SyntheticConfig) -> Result<PriceSeries, DataError> {
    validate(config)?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, 1.0).map_err(|e| DataError::InvalidParameter(format!("noise distribution: {e}")))?;

    let dates = trading_days(config.start_date, config.days);
    let mut points = Vec::with_capacity(dates.len());
    let mut regime = 0;
    let mut log_price = config.start_price.ln();
    for (i, date) in dates.into_iter().enumerate() {
        if i > 0 {
            let mut shift = 0.0;
            if config.regimes.get(regime + 1).is_some_and(|r| r.start == i) {
                regime += 1;
                shift = config.regimes[regime].jump;
            }
            let r = &config.regimes[regime];
            let z: f64 = normal.sample(&mut rng);
            log_price += r.drift + r.volatility * z + shift;
        }
        points.push(PricePoint {
            date,
            price: log_price.exp(),
        });
    }
    PriceSeries::new(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::stats;
    use crate::series::{log_returns, return_values};

    #[test]
    fn trading_days_skip_weekends() {
        // 2024-01-05 is a Friday
        let start = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let days = trading_days(start, 3);
        assert_eq!(days[1], NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
        assert_eq!(days.len(), 3);
    }

    #[test]
    fn same_seed_same_series() {
        let config = SyntheticConfig::default();
        let a = generate_prices(&config).unwrap();
        let b = generate_prices(&config).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 750);
        let c = generate_prices(&SyntheticConfig { seed: 7, ..config }).unwrap();
        assert_ne!(a.prices(), c.prices());
    }

    #[test]
    fn injected_jump_shows_in_returns() {
        let config = SyntheticConfig {
            days: 200,
            regimes: vec![
                Regime {
                    start: 0,
                    drift: 0.0,
                    volatility: 0.001,
                    jump: 0.0,
                },
                Regime {
                    start: 100,
                    drift: 0.0,
                    volatility: 0.01,
                    jump: 0.5,
                },
            ],
            ..SyntheticConfig::default()
        };
        let series = generate_prices(&config).unwrap();
        let r = return_values(&log_returns(&series).unwrap());
        // return 99 moves price 99 to price 100
        assert!(r[99] > 0.4);
        let calm = stats::sample_std(&r[..99]).unwrap();
        let wild = stats::sample_std(&r[100..]).unwrap();
        assert!(wild > 5.0 * calm);
    }

    #[test]
    fn rejects_unordered_regimes() {
        let mut config = SyntheticConfig::default();
        config.regimes.swap(1, 2);
        assert!(matches!(generate_prices(&config), Err(DataError::InvalidParameter(_))));
    }
}
