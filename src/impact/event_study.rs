//! Event-study windows on the price level.
//!
//! The event is anchored at its nearest trading date `e`. The pre window is
//! `[e - w, e)`, the post window `[e, e + w)`, both truncated at the series ends.

use std::ops::Range;

use chrono::NaiveDate;
use log::warn;
use serde::Serialize;

use crate::domain::{EventRecord, Measure, RegimeStats};
use crate::error::DataError;
use crate::series::window::{after, before, nearest_index, regime_stats};
use crate::series::PriceSeries;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventStudy {
    pub event_index: usize,
    pub trading_date: NaiveDate,
    #[serde(skip)]
    pub before_range: Range<usize>,
    #[serde(skip)]
    pub after_range: Range<usize>,
    pub before_stats: RegimeStats,
    pub after_stats: RegimeStats,
    pub price_change_usd: Measure,
    pub price_change_pct: Measure,
    /// Change in the standard deviation of price levels.
    pub volatility_change: Measure,
    pub volatility_change_pct: Measure,
    pub trend_change: Measure,
    /// `max(post) - mean(pre)`
    pub max_price_change: Measure,
    /// `min(post) - mean(pre)`
    pub min_price_change: Measure,
}

/// Nearest trading index of `event`. An event outside the series' date range snaps
/// to the first or last trading day, with a warning.
pub fn locate_event(series: &PriceSeries, event: &EventRecord) -> Result<usize, DataError> {
    let (Some(start), Some(end)) = (series.first_date(), series.last_date()) else {
        return Err(DataError::InsufficientData {
            required: 1,
            actual: 0,
        });
    };
    if event.date < start || event.date > end {
        warn!(
            "event '{}' on {} lies outside the price series ({start} to {end}); using the nearest trading day",
            event.name, event.date
        );
    }
    nearest_index(&series.dates(), event.date).ok_or(DataError::InsufficientData {
        required: 1,
        actual: 0,
    })
}

/// Log returns attributed to the price rows in `rows` (row 0 has none).
fn returns_for_rows(log_returns: &[f64], rows: &Range<usize>) -> Range<usize> {
    let end = rows.end.saturating_sub(1).min(log_returns.len());
    let start = rows.start.saturating_sub(1).min(end);
    start..end
}

/// Window statistics around price row `index`.
///
/// `log_returns[j]` is the return into price row `j + 1`. `index` is clamped to the
/// last row.
pub fn event_study(
    prices: &[f64],
    log_returns: &[f64],
    dates: &[NaiveDate],
    index: usize,
    window: usize,
) -> Result<EventStudy, DataError> {
    let n = prices.len().min(dates.len());
    let Some(last) = n.checked_sub(1) else {
        return Err(DataError::InsufficientData {
            required: 1,
            actual: 0,
        });
    };
    let index = index.min(last);
    let b = before(n, index, window);
    let a = after(n, index, window);
    let before_stats = regime_stats(&prices[b.clone()], &log_returns[returns_for_rows(log_returns, &b)]);
    let after_stats = regime_stats(&prices[a.clone()], &log_returns[returns_for_rows(log_returns, &a)]);

    Ok(EventStudy {
        event_index: index,
        trading_date: dates[index],
        before_range: b,
        after_range: a,
        price_change_usd: Measure::change(before_stats.mean_price, after_stats.mean_price),
        price_change_pct: Measure::pct_change(before_stats.mean_price, after_stats.mean_price),
        volatility_change: Measure::change(before_stats.std_price, after_stats.std_price),
        volatility_change_pct: Measure::pct_change(before_stats.std_price, after_stats.std_price),
        trend_change: Measure::change(before_stats.trend, after_stats.trend),
        max_price_change: Measure::change(before_stats.mean_price, after_stats.max_price),
        min_price_change: Measure::change(before_stats.mean_price, after_stats.min_price),
        before_stats,
        after_stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventCategory, ExpectedDirection, PricePoint, Undefined};

    fn series(prices: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2022, 2, 21).unwrap();
        PriceSeries::new(
            prices
                .iter()
                .enumerate()
                .map(|(i, &price)| PricePoint {
                    date: start + chrono::Days::new(i as u64),
                    price,
                })
                .collect(),
        )
        .unwrap()
    }

    fn event(date: NaiveDate) -> EventRecord {
        EventRecord {
            date,
            name: "Russia invades Ukraine".into(),
            category: EventCategory::Conflict,
            region: "Europe".into(),
            expected_direction: ExpectedDirection::Positive,
            description: String::new(),
        }
    }

    #[test]
    fn step_series_round_trip() {
        let s = series(&[100.0, 100.0, 100.0, 120.0, 120.0, 120.0]);
        let idx = locate_event(&s, &event(s.points()[3].date)).unwrap();
        assert_eq!(idx, 3);
        let prices = s.prices();
        let lr: Vec<f64> = prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
        let study = event_study(&prices, &lr, &s.dates(), idx, 30).unwrap();
        assert_eq!(study.before_stats.mean_price, Measure::Defined(100.0));
        assert_eq!(study.after_stats.mean_price, Measure::Defined(120.0));
        assert!((study.price_change_pct.value().unwrap() - 20.0).abs() < 1e-12);
        assert_eq!(study.price_change_usd, Measure::Defined(20.0));
        assert_eq!(study.volatility_change, Measure::Defined(0.0));
        assert_eq!(study.volatility_change_pct, Measure::Undefined(Undefined::DivisionByZero));
        assert_eq!(study.max_price_change, Measure::Defined(20.0));
    }

    #[test]
    fn events_outside_the_series_snap_to_the_ends() {
        let s = series(&[50.0, 51.0, 52.0]);
        let early = locate_event(&s, &event(NaiveDate::from_ymd_opt(2010, 1, 1).unwrap())).unwrap();
        assert_eq!(early, 0);
        let late = locate_event(&s, &event(NaiveDate::from_ymd_opt(2030, 6, 1).unwrap())).unwrap();
        assert_eq!(late, 2);
    }

    #[test]
    fn empty_series_is_insufficient() {
        let err = event_study(&[], &[], &[], 0, 30).unwrap_err();
        assert_eq!(err, DataError::InsufficientData { required: 1, actual: 0 });

        let s = series(&[50.0, 51.0]);
        let study = event_study(&s.prices(), &[0.02], &s.dates(), 9, 30).unwrap();
        assert_eq!(study.event_index, 1);
        assert_eq!(study.trading_date, s.points()[1].date);
    }

    #[test]
    fn event_on_first_day_has_empty_pre_window() {
        let s = series(&[50.0, 51.0, 52.0]);
        let prices = s.prices();
        let lr: Vec<f64> = prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
        let study = event_study(&prices, &lr, &s.dates(), 0, 30).unwrap();
        assert_eq!(study.before_stats.observations, 0);
        assert_eq!(study.price_change_pct, Measure::Undefined(Undefined::InsufficientData));
        assert_eq!(study.after_stats.observations, 3);
    }

    #[test]
    fn returns_map_onto_rows() {
        let lr = [0.1, 0.2, 0.3, 0.4];
        assert_eq!(returns_for_rows(&lr, &(0..3)), 0..2);
        assert_eq!(returns_for_rows(&lr, &(2..5)), 1..4);
        assert_eq!(returns_for_rows(&lr, &(0..0)), 0..0);
    }
}
