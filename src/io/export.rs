//! Export results to CSV.
//!
//! Every table is a flat record type so it loads cleanly into spreadsheets; undefined
//! statistics appear as their reason (e.g. `insufficient_data`) instead of an empty
//! cell or NaN.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{ChangePointEstimate, ChangePointResult, EventCorrelation, EventRecord, Measure};
use crate::error::AnalysisError;
use crate::impact::ImpactResult;
use crate::series::PriceSeries;

/// One row of `event_impacts.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventImpactRecord {
    pub event_date: NaiveDate,
    pub event_name: String,
    pub event_category: String,
    pub region: String,
    pub expected_direction: String,
    pub trading_date: NaiveDate,
    pub before_observations: usize,
    pub after_observations: usize,
    pub before_mean_price: Measure,
    pub after_mean_price: Measure,
    pub price_change_usd: Measure,
    pub price_change_pct: Measure,
    pub volatility_change: Measure,
    pub volatility_change_pct: Measure,
    pub trend_change: Measure,
    pub max_price_change: Measure,
    pub min_price_change: Measure,
    pub t_statistic: Measure,
    pub p_value: Measure,
    pub significant: bool,
    pub wilcoxon_p_value: Measure,
    pub cohens_d: Measure,
    pub regression_effect: Measure,
    pub regression_p_value: Measure,
    pub regression_r_squared: Measure,
    pub cumulative_max_impact: Measure,
    pub cumulative_min_impact: Measure,
    pub cumulative_final_impact: Measure,
}

impl From<&ImpactResult> for EventImpactRecord {
    fn from(r: &ImpactResult) -> Self {
        let s = &r.study;
        Self {
            event_date: r.event.date,
            event_name: r.event.name.clone(),
            event_category: r.event.category.label().to_string(),
            region: r.event.region.clone(),
            expected_direction: r.event.expected_direction.label().to_string(),
            trading_date: s.trading_date,
            before_observations: s.before_stats.observations,
            after_observations: s.after_stats.observations,
            before_mean_price: s.before_stats.mean_price,
            after_mean_price: s.after_stats.mean_price,
            price_change_usd: s.price_change_usd,
            price_change_pct: s.price_change_pct,
            volatility_change: s.volatility_change,
            volatility_change_pct: s.volatility_change_pct,
            trend_change: s.trend_change,
            max_price_change: s.max_price_change,
            min_price_change: s.min_price_change,
            t_statistic: r.significance.t_test.statistic,
            p_value: r.significance.t_test.p_value,
            significant: r.significant,
            wilcoxon_p_value: r.significance.wilcoxon.p_value,
            cohens_d: r.significance.cohens_d,
            regression_effect: r.regression.effect,
            regression_p_value: r.regression.p_value,
            regression_r_squared: r.regression.r_squared,
            cumulative_max_impact: r.cumulative.max_impact,
            cumulative_min_impact: r.cumulative.min_impact,
            cumulative_final_impact: r.cumulative.final_impact,
        }
    }
}

/// One row of `correlations.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationRecord {
    pub change_point_date: NaiveDate,
    pub change_point_parameter: String,
    pub event_date: NaiveDate,
    pub event_name: String,
    pub event_category: String,
    pub days_difference: u32,
    pub correlation_strength: f64,
}

impl From<&EventCorrelation> for CorrelationRecord {
    fn from(c: &EventCorrelation) -> Self {
        Self {
            change_point_date: c.change_point.date,
            change_point_parameter: c.change_point.parameter.clone(),
            event_date: c.event.date,
            event_name: c.event.name.clone(),
            event_category: c.event.category.label().to_string(),
            days_difference: c.days_difference,
            correlation_strength: c.correlation_strength,
        }
    }
}

/// Catalog row in the same layout `read_events` accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCsvRow {
    pub date: NaiveDate,
    pub event: String,
    pub category: String,
    pub description: String,
    pub expected_impact: String,
    pub region: String,
}

impl From<&EventRecord> for EventCsvRow {
    fn from(e: &EventRecord) -> Self {
        Self {
            date: e.date,
            event: e.name.clone(),
            category: e.category.label().to_string(),
            description: e.description.clone(),
            expected_impact: e.expected_direction.label().to_string(),
            region: e.region.clone(),
        }
    }
}

/// Price row in the `Date,Price` layout `read_prices` accepts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceCsvRow {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Price")]
    pub price: f64,
}

/// Serialize `rows` as CSV with a header line.
pub fn write_records<W: Write, T: Serialize>(out: W, rows: impl IntoIterator<Item = T>) -> Result<(), AnalysisError> {
    let mut writer = csv::Writer::from_writer(out);
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| AnalysisError::Export(format!("failed to write CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AnalysisError::Export(format!("failed to flush CSV: {e}")))
}

fn create(path: &Path) -> Result<File, AnalysisError> {
    File::create(path).map_err(|e| AnalysisError::Export(format!("failed to create '{}': {e}", path.display())))
}

pub fn write_change_points_csv(path: &Path, change_points: &[ChangePointEstimate]) -> Result<(), AnalysisError> {
    write_records(create(path)?, change_points.iter().map(ChangePointResult::from))
}

pub fn write_event_impacts_csv(path: &Path, impacts: &[ImpactResult]) -> Result<(), AnalysisError> {
    write_records(create(path)?, impacts.iter().map(EventImpactRecord::from))
}

pub fn write_correlations_csv(path: &Path, correlations: &[EventCorrelation]) -> Result<(), AnalysisError> {
    write_records(create(path)?, correlations.iter().map(CorrelationRecord::from))
}

pub fn write_catalog_csv(path: &Path, events: &[EventRecord]) -> Result<(), AnalysisError> {
    write_records(create(path)?, events.iter().map(EventCsvRow::from))
}

pub fn write_prices_csv(path: &Path, series: &PriceSeries) -> Result<(), AnalysisError> {
    write_records(
        create(path)?,
        series.points().iter().map(|p| PriceCsvRow {
            date: p.date,
            price: p.price,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventCategory, ExpectedDirection, RegimeStats, Undefined};
    use crate::io::ingest::read_events;

    fn stats(mean: Measure) -> RegimeStats {
        RegimeStats {
            observations: 3,
            mean_price: mean,
            std_price: Measure::Defined(0.0),
            min_price: mean,
            max_price: mean,
            mean_volatility: Measure::Undefined(Undefined::InsufficientData),
            trend: Measure::Defined(0.0),
        }
    }

    #[test]
    fn change_point_rows_mark_undefined_cells() {
        let date = NaiveDate::from_ymd_opt(2008, 9, 15).unwrap();
        let cp = ChangePointEstimate {
            parameter: "tau".into(),
            index: 10,
            date,
            credible_indices: (8, 12),
            credible_interval: (date, date),
            before_stats: stats(Measure::Defined(100.0)),
            after_stats: stats(Measure::Defined(80.0)),
        };
        let mut buf = Vec::new();
        write_records(&mut buf, [ChangePointResult::from(&cp)]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "change_point_date,price_change_usd,price_change_pct,volatility_change,\
             before_mean_price,after_mean_price,before_volatility,after_volatility"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("2008-09-15,-20.0,"));
        assert_eq!(row.split(',').nth(3), Some("insufficient_data"));
    }

    #[test]
    fn catalog_round_trips_through_ingest() {
        let events = vec![EventRecord {
            date: NaiveDate::from_ymd_opt(2014, 11, 27).unwrap(),
            name: "OPEC maintains production".into(),
            category: EventCategory::Opec,
            region: "Global".into(),
            expected_direction: ExpectedDirection::Negative,
            description: "No cut, despite oversupply".into(),
        }];
        let mut buf = Vec::new();
        write_records(&mut buf, events.iter().map(EventCsvRow::from)).unwrap();
        let loaded = read_events(buf.as_slice()).unwrap();
        assert!(loaded.row_errors.is_empty());
        assert_eq!(loaded.catalog.events(), events.as_slice());
    }

    #[test]
    fn prices_round_trip_through_ingest() {
        let rows = [
            PriceCsvRow {
                date: NaiveDate::from_ymd_opt(2020, 4, 20).unwrap(),
                price: 19.33,
            },
            PriceCsvRow {
                date: NaiveDate::from_ymd_opt(2020, 4, 21).unwrap(),
                price: 9.12,
            },
        ];
        let mut buf = Vec::new();
        write_records(&mut buf, rows).unwrap();
        assert!(String::from_utf8_lossy(&buf).starts_with("Date,Price\n2020-04-20,19.33\n"));
        let loaded = crate::io::ingest::read_prices(buf.as_slice()).unwrap();
        assert_eq!(loaded.series.prices(), vec![19.33, 9.12]);
    }

    #[test]
    fn infinite_t_statistic_survives_json_and_matches_csv() {
        let start = NaiveDate::from_ymd_opt(2022, 2, 21).unwrap();
        let points = [100.0, 100.0, 100.0, 120.0, 120.0, 120.0]
            .iter()
            .enumerate()
            .map(|(i, &price)| crate::domain::PricePoint {
                date: start + chrono::Days::new(i as u64),
                price,
            })
            .collect();
        let series = PriceSeries::new(points).unwrap();
        let event = EventRecord {
            date: start + chrono::Days::new(3),
            name: "Russia invades Ukraine".into(),
            category: EventCategory::Conflict,
            region: "Europe".into(),
            expected_direction: ExpectedDirection::Positive,
            description: String::new(),
        };
        let settings = crate::impact::ImpactSettings {
            window_days: 30,
            significance_threshold: 0.05,
        };
        let result = crate::impact::analyze_event(&series, &event, settings).unwrap();
        let record = EventImpactRecord::from(&result);
        assert_eq!(record.t_statistic, Measure::Defined(f64::INFINITY));

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""t_statistic":"inf""#));
        assert!(!json.contains("null"));
        let back: EventImpactRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.t_statistic, record.t_statistic);
        assert_eq!(back.p_value, Measure::Defined(0.0));
        assert_eq!(back.price_change_usd, Measure::Defined(20.0));
        assert_eq!(back.volatility_change_pct, Measure::Undefined(Undefined::DivisionByZero));

        let mut buf = Vec::new();
        write_records(&mut buf, [&record]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let header: Vec<&str> = text.lines().next().unwrap().split(',').collect();
        let row: Vec<&str> = text.lines().nth(1).unwrap().split(',').collect();
        let col = header.iter().position(|h| *h == "t_statistic").unwrap();
        assert_eq!(row[col], "inf");
    }
}
