//! Impact quantification: per-event window statistics, regressions and significance
//! tests, plus batch-level aggregates.
//!
//! Events are anchored at their nearest trading day; one dated outside the price series
//! snaps to the first or last day. An event that still cannot be analysed is recorded
//! in [`ImpactAnalysis::skipped`] and the batch continues.

pub mod cumulative;
pub mod event_study;
pub mod regression;
pub mod significance;
pub mod summary;

use log::{debug, warn};
use serde::Serialize;

use crate::domain::{EventRecord, Measure, Undefined};
use crate::error::{AnalysisError, DataError};
use crate::models::builder::event_indicator;
use crate::series::{log_returns, return_values, PriceSeries};

pub use cumulative::{cumulative_impact, CumulativeImpact};
pub use event_study::{event_study, locate_event, EventStudy};
pub use regression::{regress_on_indicator, step_regression, EventRegression};
pub use significance::{aggregate_significance, event_significance, AggregateSignificance, EventSignificance};
pub use summary::{summarize_impacts, GroupSummary, ImpactSummary};

/// Quantified impact of one event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactResult {
    pub event: EventRecord,
    pub study: EventStudy,
    pub regression: EventRegression,
    pub significance: EventSignificance,
    /// t-test p-value below the configured threshold.
    pub significant: bool,
    pub cumulative: CumulativeImpact,
}

impl ImpactResult {
    pub fn price_change_pct(&self) -> Measure {
        self.study.price_change_pct
    }

    pub fn volatility_change_pct(&self) -> Measure {
        self.study.volatility_change_pct
    }

    pub fn regression_effect(&self) -> Measure {
        self.regression.effect
    }

    pub fn regression_p_value(&self) -> Measure {
        self.regression.p_value
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedEvent {
    pub event: EventRecord,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactAnalysis {
    pub results: Vec<ImpactResult>,
    pub skipped: Vec<SkippedEvent>,
    pub aggregate: AggregateSignificance,
    /// Event-day indicator regressed on the full log-return series.
    pub cross_event: EventRegression,
    pub summary: ImpactSummary,
}

/// Parameters shared by every event in a batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpactSettings {
    pub window_days: usize,
    pub significance_threshold: f64,
}

/// Data views computed once per batch.
struct SeriesView {
    prices: Vec<f64>,
    log_returns: Vec<f64>,
    dates: Vec<chrono::NaiveDate>,
}

impl SeriesView {
    fn new(series: &PriceSeries) -> Result<Self, DataError> {
        Ok(Self {
            prices: series.prices(),
            log_returns: return_values(&log_returns(series)?),
            dates: series.dates(),
        })
    }
}

fn analyze_in_view(
    series: &PriceSeries,
    view: &SeriesView,
    event: &EventRecord,
    settings: ImpactSettings,
) -> Result<ImpactResult, DataError> {
    let index = locate_event(series, event)?;
    let study = event_study(&view.prices, &view.log_returns, &view.dates, index, settings.window_days)?;
    let before = &view.prices[study.before_range.clone()];
    let after = &view.prices[study.after_range.clone()];

    let significance = event_significance(before, after);
    Ok(ImpactResult {
        event: event.clone(),
        regression: step_regression(before, after),
        significant: significance.t_test.significant(settings.significance_threshold),
        cumulative: cumulative_impact(before, after),
        significance,
        study,
    })
}

/// Quantify a single event against `series`.
pub fn analyze_event(
    series: &PriceSeries,
    event: &EventRecord,
    settings: ImpactSettings,
) -> Result<ImpactResult, AnalysisError> {
    let view = SeriesView::new(series)?;
    Ok(analyze_in_view(series, &view, event, settings)?)
}

/// Quantify every event in `events`, skipping (and recording) the ones that cannot
/// be analysed.
pub fn analyze_events(
    series: &PriceSeries,
    events: &[EventRecord],
    settings: ImpactSettings,
) -> Result<ImpactAnalysis, AnalysisError> {
    let view = SeriesView::new(series)?;

    let mut results = Vec::with_capacity(events.len());
    let mut skipped = Vec::new();
    for event in events {
        match analyze_in_view(series, &view, event, settings) {
            Ok(r) => {
                debug!(
                    "{}: change {:.2}% (p = {:.4})",
                    event.name,
                    r.price_change_pct(),
                    r.significance.t_test.p_value
                );
                results.push(r);
            }
            Err(err) => {
                warn!("skipping event '{}': {err}", event.name);
                skipped.push(SkippedEvent {
                    event: event.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    let changes: Vec<f64> = results.iter().filter_map(|r| r.price_change_pct().value()).collect();
    let returns = log_returns(series)?;
    let indicator = event_indicator(&returns, events);
    let cross_event = regress_on_indicator(&view.log_returns, &indicator).unwrap_or_else(|err| {
        debug!("cross-event regression unavailable: {err}");
        EventRegression::undefined(Undefined::SingularMatrix, view.log_returns.len())
    });

    Ok(ImpactAnalysis {
        aggregate: aggregate_significance(&changes),
        cross_event,
        summary: summarize_impacts(&results),
        results,
        skipped,
    })
}
