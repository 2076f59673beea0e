//! `summary.json`: the whole run in one pretty-printed document.

use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use crate::app::pipeline::{LoadedData, SampledPosterior};
use crate::diagnostics::ConvergenceReport;
use crate::domain::{AnalysisConfig, ChangePointEstimate, ChangePointResult, EventCorrelation};
use crate::error::AnalysisError;
use crate::impact::{AggregateSignificance, EventRegression, ImpactAnalysis, ImpactSummary, SkippedEvent};
use crate::io::export::{CorrelationRecord, EventImpactRecord};
use crate::models::selection::CandidateScore;
use crate::posterior::ParameterSummary;

#[derive(Debug, Serialize)]
pub struct DataSummary {
    pub prices: usize,
    pub returns: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub events: usize,
}

#[derive(Debug, Serialize)]
pub struct ModelSummary<'a> {
    pub model: &'static str,
    pub n_changepoints: usize,
    pub candidates: &'a [CandidateScore],
    pub convergence: &'a ConvergenceReport,
    pub parameters: &'a [ParameterSummary],
}

#[derive(Debug, Serialize)]
pub struct ChangePointSummary<'a> {
    #[serde(flatten)]
    pub result: ChangePointResult,
    pub parameter: &'a str,
    pub index: usize,
    pub credible_interval: (NaiveDate, NaiveDate),
}

#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub tool: &'static str,
    pub version: &'static str,
    pub config: &'a AnalysisConfig,
    pub data: DataSummary,
    pub model: ModelSummary<'a>,
    pub change_points: Vec<ChangePointSummary<'a>>,
    pub correlations: Vec<CorrelationRecord>,
    pub event_impacts: Vec<EventImpactRecord>,
    pub skipped_events: &'a [SkippedEvent],
    pub aggregate_significance: &'a AggregateSignificance,
    pub cross_event_regression: &'a EventRegression,
    pub impact_summary: &'a ImpactSummary,
}

impl<'a> RunSummary<'a> {
    pub fn new(
        config: &'a AnalysisConfig,
        data: &'a LoadedData,
        posterior: &'a SampledPosterior,
        change_points: &'a [ChangePointEstimate],
        correlations: &'a [EventCorrelation],
        impacts: &'a ImpactAnalysis,
    ) -> Self {
        Self {
            tool: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            config,
            data: DataSummary {
                prices: data.series.len(),
                returns: data.returns.len(),
                first_date: data.series.first_date(),
                last_date: data.series.last_date(),
                events: data.catalog.len(),
            },
            model: ModelSummary {
                model: posterior.spec.label(),
                n_changepoints: posterior.n_changepoints,
                candidates: &posterior.scores,
                convergence: &posterior.convergence,
                parameters: &posterior.parameters,
            },
            change_points: change_points
                .iter()
                .map(|cp| ChangePointSummary {
                    result: ChangePointResult::from(cp),
                    parameter: &cp.parameter,
                    index: cp.index,
                    credible_interval: cp.credible_interval,
                })
                .collect(),
            correlations: correlations.iter().map(CorrelationRecord::from).collect(),
            event_impacts: impacts.results.iter().map(EventImpactRecord::from).collect(),
            skipped_events: &impacts.skipped,
            aggregate_significance: &impacts.aggregate,
            cross_event_regression: &impacts.cross_event,
            impact_summary: &impacts.summary,
        }
    }
}

pub fn write_summary_json(path: &Path, summary: &RunSummary<'_>) -> Result<(), AnalysisError> {
    let file = File::create(path)
        .map_err(|e| AnalysisError::Export(format!("failed to create '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, summary)
        .map_err(|e| AnalysisError::Export(format!("failed to write summary JSON: {e}")))
}
