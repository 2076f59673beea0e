//! The analysis session: one explicit state machine shared by every front-end.
//!
//! Stages complete strictly in order:
//!
//! `IDLE → DATA_LOADED → MODEL_BUILT → SAMPLED → REDUCED → CORRELATED → QUANTIFIED → EXPORTED`
//!
//! Calling a stage before its prerequisite fails with a [`PrecedenceError`].
//! Re-running a stage replaces its artifact and discards everything downstream, so
//! the artifacts held by a session are always mutually consistent. Artifacts are
//! immutable and shared through `Arc`; callers may keep them after the session moves on.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};

use crate::diagnostics::{check_convergence, ConvergenceReport, Thresholds};
use crate::domain::{AnalysisConfig, ChangePointEstimate, EventCorrelation, ModelChoice, ReturnPoint, Stage};
use crate::error::{AnalysisError, ModelSpecError, PrecedenceError};
use crate::events::{correlate, EventCatalog};
use crate::impact::{analyze_events, ImpactAnalysis, ImpactSettings};
use crate::io::export::{write_catalog_csv, write_change_points_csv, write_correlations_csv, write_event_impacts_csv};
use crate::io::run_json::{write_summary_json, RunSummary};
use crate::models::builder::build_model;
use crate::models::selection::{score_candidate, select_by_bic, CandidateScore};
use crate::models::ChangePointModelSpec;
use crate::posterior::{reduce_change_points, summarize, ParameterSummary};
use crate::sampler::{PosteriorDraws, PosteriorSampler};
use crate::series::{aligned_prices, log_returns, return_values, PriceSeries};

/// Output of `DATA_LOADED`.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub series: PriceSeries,
    pub returns: Vec<ReturnPoint>,
    /// Price on each return's date.
    pub aligned_prices: Vec<f64>,
    pub catalog: EventCatalog,
}

/// Output of `MODEL_BUILT`: one spec per candidate number of change points.
#[derive(Debug, Clone)]
pub struct BuiltModels {
    pub candidates: Vec<(usize, ChangePointModelSpec)>,
}

/// Output of `SAMPLED`: the selected candidate's posterior and its diagnostics.
#[derive(Debug, Clone)]
pub struct SampledPosterior {
    pub n_changepoints: usize,
    pub spec: ChangePointModelSpec,
    pub draws: PosteriorDraws,
    pub convergence: ConvergenceReport,
    pub parameters: Vec<ParameterSummary>,
    /// BIC of every candidate fitted, in the order they were fitted.
    pub scores: Vec<CandidateScore>,
}

#[derive(Debug, Clone)]
pub struct ExportManifest {
    pub directory: PathBuf,
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AnalysisSession {
    config: AnalysisConfig,
    stage: Stage,
    data: Option<Arc<LoadedData>>,
    models: Option<Arc<BuiltModels>>,
    posterior: Option<Arc<SampledPosterior>>,
    change_points: Option<Arc<Vec<ChangePointEstimate>>>,
    correlations: Option<Arc<Vec<EventCorrelation>>>,
    impacts: Option<Arc<ImpactAnalysis>>,
    export: Option<Arc<ExportManifest>>,
}

fn artifact<T>(slot: &Option<Arc<T>>, attempted: Stage, missing: Stage) -> Result<Arc<T>, PrecedenceError> {
    slot.clone().ok_or(PrecedenceError { attempted, missing })
}

impl AnalysisSession {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            stage: Stage::Idle,
            data: None,
            models: None,
            posterior: None,
            change_points: None,
            correlations: None,
            impacts: None,
            export: None,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn data(&self) -> Option<Arc<LoadedData>> {
        self.data.clone()
    }

    pub fn models(&self) -> Option<Arc<BuiltModels>> {
        self.models.clone()
    }

    pub fn posterior(&self) -> Option<Arc<SampledPosterior>> {
        self.posterior.clone()
    }

    pub fn change_points(&self) -> Option<Arc<Vec<ChangePointEstimate>>> {
        self.change_points.clone()
    }

    pub fn correlations(&self) -> Option<Arc<Vec<EventCorrelation>>> {
        self.correlations.clone()
    }

    pub fn impacts(&self) -> Option<Arc<ImpactAnalysis>> {
        self.impacts.clone()
    }

    pub fn export_manifest(&self) -> Option<Arc<ExportManifest>> {
        self.export.clone()
    }

    fn require(&self, attempted: Stage) -> Result<(), PrecedenceError> {
        match attempted.prerequisite() {
            Some(missing) if self.stage < missing => Err(PrecedenceError { attempted, missing }),
            _ => Ok(()),
        }
    }

    /// Mark `stage` complete and drop every artifact produced after it.
    fn complete(&mut self, stage: Stage) {
        self.stage = stage;
        if stage < Stage::Exported {
            self.export = None;
        }
        if stage < Stage::Quantified {
            self.impacts = None;
        }
        if stage < Stage::Correlated {
            self.correlations = None;
        }
        if stage < Stage::Reduced {
            self.change_points = None;
        }
        if stage < Stage::Sampled {
            self.posterior = None;
        }
        if stage < Stage::ModelBuilt {
            self.models = None;
        }
        info!("stage {stage} complete");
    }

    pub fn load(&mut self, series: PriceSeries, catalog: EventCatalog) -> Result<(), AnalysisError> {
        self.require(Stage::DataLoaded)?;
        let returns = log_returns(&series)?;
        info!(
            "loaded {} prices ({} returns) and {} events",
            series.len(),
            returns.len(),
            catalog.len()
        );
        self.data = Some(Arc::new(LoadedData {
            aligned_prices: aligned_prices(&series),
            series,
            returns,
            catalog,
        }));
        self.complete(Stage::DataLoaded);
        Ok(())
    }

    /// Candidate break counts for the configured model family.
    fn candidate_counts(&self) -> Vec<usize> {
        match self.config.model {
            ModelChoice::Single | ModelChoice::Hierarchical => vec![1],
            ModelChoice::Multiple | ModelChoice::EventAugmented => self.config.changepoint_range(),
        }
    }

    pub fn build_model(&mut self) -> Result<(), AnalysisError> {
        self.require(Stage::ModelBuilt)?;
        let data = artifact(&self.data, Stage::ModelBuilt, Stage::DataLoaded)?;
        let mut candidates = Vec::new();
        for k in self.candidate_counts() {
            let spec = build_model(&self.config, k, &data.returns, data.catalog.events())?;
            info!(
                "built {} model: {} segments, {} parameters",
                spec.label(),
                spec.n_segments(),
                spec.n_parameters()
            );
            candidates.push((spec.location_names().len(), spec));
        }
        self.models = Some(Arc::new(BuiltModels { candidates }));
        self.complete(Stage::ModelBuilt);
        Ok(())
    }

    /// Sample every candidate and keep the one chosen by BIC.
    pub fn sample(&mut self, sampler: &dyn PosteriorSampler) -> Result<(), AnalysisError> {
        self.require(Stage::Sampled)?;
        let data = artifact(&self.data, Stage::Sampled, Stage::DataLoaded)?;
        let models = artifact(&self.models, Stage::Sampled, Stage::ModelBuilt)?;
        let budget = self.config.budget();
        let y = return_values(&data.returns);

        let mut fitted = Vec::with_capacity(models.candidates.len());
        let mut scores = Vec::with_capacity(models.candidates.len());
        for (k, spec) in &models.candidates {
            info!(
                "sampling {} (k = {k}): {} chains x {} draws, {} tuning",
                spec.label(),
                budget.chains,
                budget.draws,
                budget.tune
            );
            let draws = sampler.sample(spec, &data.returns, &budget)?;
            let score = score_candidate(spec, *k, &y, &draws)?;
            info!("k = {k}: log-likelihood {:.2}, BIC {:.2}", score.log_likelihood, score.bic);
            scores.push(score);
            fitted.push((*k, spec.clone(), draws));
        }

        let selected = select_by_bic(&scores).unwrap_or(0);
        if fitted.len() > 1 {
            info!("selected k = {} by BIC", scores[selected].n_changepoints);
        }
        let Some((n_changepoints, spec, draws)) = fitted.into_iter().nth(selected) else {
            return Err(ModelSpecError::TooFewSegments { required: 2, actual: 0 }.into());
        };

        let thresholds = Thresholds {
            rhat: self.config.rhat_threshold,
            min_ess: self.config.min_ess,
        };
        let convergence = check_convergence(&draws, thresholds);
        for warning in &convergence.warnings {
            warn!("convergence: {warning}");
        }
        if convergence.converged {
            info!("all parameters converged");
        }
        let parameters = summarize(&draws, &convergence, &spec.priors());

        self.posterior = Some(Arc::new(SampledPosterior {
            n_changepoints,
            spec,
            draws,
            convergence,
            parameters,
            scores,
        }));
        self.complete(Stage::Sampled);
        Ok(())
    }

    pub fn reduce(&mut self) -> Result<(), AnalysisError> {
        self.require(Stage::Reduced)?;
        let data = artifact(&self.data, Stage::Reduced, Stage::DataLoaded)?;
        let posterior = artifact(&self.posterior, Stage::Reduced, Stage::Sampled)?;
        let estimates = reduce_change_points(
            &posterior.spec,
            &posterior.draws,
            &data.returns,
            &data.aligned_prices,
            self.config.window_days,
        )?;
        for cp in &estimates {
            info!(
                "change point {} on {} (90% CI {} to {}), price change {:.2}%",
                cp.parameter,
                cp.date,
                cp.credible_interval.0,
                cp.credible_interval.1,
                cp.price_change_pct()
            );
        }
        self.change_points = Some(Arc::new(estimates));
        self.complete(Stage::Reduced);
        Ok(())
    }

    pub fn correlate(&mut self) -> Result<(), AnalysisError> {
        self.require(Stage::Correlated)?;
        let data = artifact(&self.data, Stage::Correlated, Stage::DataLoaded)?;
        let change_points = artifact(&self.change_points, Stage::Correlated, Stage::Reduced)?;
        let pairs = correlate(&change_points, data.catalog.events(), self.config.tolerance_days);
        info!(
            "{} change point/event pairs within {} days",
            pairs.len(),
            self.config.tolerance_days
        );
        self.correlations = Some(Arc::new(pairs));
        self.complete(Stage::Correlated);
        Ok(())
    }

    pub fn quantify(&mut self) -> Result<(), AnalysisError> {
        self.require(Stage::Quantified)?;
        let data = artifact(&self.data, Stage::Quantified, Stage::DataLoaded)?;
        let settings = ImpactSettings {
            window_days: self.config.window_days,
            significance_threshold: self.config.significance_threshold,
        };
        let analysis = analyze_events(&data.series, data.catalog.events(), settings)?;
        info!(
            "quantified {} events ({} significant, {} skipped)",
            analysis.results.len(),
            analysis.summary.significant_events,
            analysis.skipped.len()
        );
        self.impacts = Some(Arc::new(analysis));
        self.complete(Stage::Quantified);
        Ok(())
    }

    /// Write every result table plus `summary.json` into `dir` (created if missing).
    pub fn export(&mut self, dir: &Path) -> Result<(), AnalysisError> {
        self.require(Stage::Exported)?;
        let data = artifact(&self.data, Stage::Exported, Stage::DataLoaded)?;
        let posterior = artifact(&self.posterior, Stage::Exported, Stage::Sampled)?;
        let change_points = artifact(&self.change_points, Stage::Exported, Stage::Reduced)?;
        let correlations = artifact(&self.correlations, Stage::Exported, Stage::Correlated)?;
        let impacts = artifact(&self.impacts, Stage::Exported, Stage::Quantified)?;

        std::fs::create_dir_all(dir)
            .map_err(|e| AnalysisError::Export(format!("failed to create '{}': {e}", dir.display())))?;
        let path = |name: &str| dir.join(name);

        let files = vec![
            path("change_point_results.csv"),
            path("event_impacts.csv"),
            path("correlations.csv"),
            path("events.csv"),
            path("summary.json"),
        ];
        write_change_points_csv(&files[0], &change_points)?;
        write_event_impacts_csv(&files[1], &impacts.results)?;
        write_correlations_csv(&files[2], &correlations)?;
        write_catalog_csv(&files[3], data.catalog.events())?;
        let summary = RunSummary::new(&self.config, &data, &posterior, &change_points, &correlations, &impacts);
        write_summary_json(&files[4], &summary)?;

        info!("wrote {} files to {}", files.len(), dir.display());
        self.export = Some(Arc::new(ExportManifest {
            directory: dir.to_path_buf(),
            files,
        }));
        self.complete(Stage::Exported);
        Ok(())
    }
}

/// Run every stage through `QUANTIFIED`, plus `EXPORTED` when the config names an
/// output directory.
pub fn run_analysis(
    config: AnalysisConfig,
    series: PriceSeries,
    catalog: EventCatalog,
    sampler: &dyn PosteriorSampler,
) -> Result<AnalysisSession, AnalysisError> {
    let mut session = AnalysisSession::new(config);
    session.load(series, catalog)?;
    session.build_model()?;
    session.sample(sampler)?;
    session.reduce()?;
    session.correlate()?;
    session.quantify()?;
    if let Some(dir) = session.config().out_dir.clone() {
        session.export(&dir)?;
    }
    Ok(session)
}

#[cfg(test)]
mod tests {
    use chrono::{Days, NaiveDate};

    use super::*;
    use crate::domain::{EventCategory, EventRecord, ExpectedDirection, PricePoint, SamplerBudget};
    use crate::error::SamplingError;
    use crate::sampler::MetropolisSampler;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
    }

    /// Driftless returns for 79 days, then a steady 3% daily drift.
    fn series() -> PriceSeries {
        let mut price = 60.0;
        let mut points = vec![PricePoint { date: start(), price }];
        for i in 0..159u64 {
            let drift = if i >= 79 { 0.03 } else { 0.0 };
            let wiggle = if i % 2 == 0 { 0.01 } else { -0.01 };
            price *= f64::exp(drift + wiggle);
            points.push(PricePoint {
                date: start() + Days::new(i + 1),
                price,
            });
        }
        PriceSeries::new(points).unwrap()
    }

    fn catalog() -> EventCatalog {
        EventCatalog::new(vec![EventRecord {
            date: start() + Days::new(81),
            name: "Supply shock".into(),
            category: EventCategory::Opec,
            region: "Global".into(),
            expected_direction: ExpectedDirection::Positive,
            description: String::new(),
        }])
    }

    fn config() -> AnalysisConfig {
        AnalysisConfig {
            model: ModelChoice::Single,
            draws: 300,
            tune: 300,
            chains: 2,
            seed: 7,
            ..AnalysisConfig::default()
        }
    }

    /// Returns a fixed posterior with every location draw at `tau`.
    struct FixedSampler {
        tau: f64,
    }

    impl PosteriorSampler for FixedSampler {
        fn sample(
            &self,
            spec: &ChangePointModelSpec,
            _returns: &[ReturnPoint],
            budget: &SamplerBudget,
        ) -> Result<PosteriorDraws, SamplingError> {
            let parameters = spec
                .parameters()
                .into_iter()
                .map(|decl| {
                    let value = match decl.kind {
                        crate::models::ParameterKind::Location => self.tau,
                        kind if kind.is_positive() => 0.05,
                        _ => 0.0,
                    };
                    (decl.name, vec![vec![value; budget.draws]; budget.chains])
                })
                .collect();
            Ok(PosteriorDraws::from_parameter_chains(parameters))
        }
    }

    #[test]
    fn out_of_order_stage_names_missing_prerequisite() {
        let mut session = AnalysisSession::new(config());
        let err = session.reduce().unwrap_err();
        assert_eq!(
            err,
            AnalysisError::Precedence(PrecedenceError {
                attempted: Stage::Reduced,
                missing: Stage::Sampled,
            })
        );
        assert_eq!(session.stage(), Stage::Idle);
    }

    #[test]
    fn rerunning_a_stage_discards_downstream_artifacts() {
        let mut session = AnalysisSession::new(config());
        session.load(series(), catalog()).unwrap();
        session.build_model().unwrap();
        session.sample(&FixedSampler { tau: 78.6 }).unwrap();
        session.reduce().unwrap();
        let kept = session.change_points().unwrap();
        assert_eq!(kept[0].index, 79);

        session.build_model().unwrap();
        assert_eq!(session.stage(), Stage::ModelBuilt);
        assert!(session.posterior().is_none());
        assert!(session.change_points().is_none());
        // artifacts handed out earlier stay valid
        assert_eq!(kept[0].index, 79);
        assert!(matches!(session.correlate(), Err(AnalysisError::Precedence(_))));
    }

    #[test]
    fn fixed_posterior_flows_through_every_stage() {
        let mut session = AnalysisSession::new(config());
        session.load(series(), catalog()).unwrap();
        session.build_model().unwrap();
        session.sample(&FixedSampler { tau: 79.0 }).unwrap();
        session.reduce().unwrap();
        session.correlate().unwrap();
        session.quantify().unwrap();

        let cps = session.change_points().unwrap();
        assert_eq!(cps.len(), 1);
        // return 79 is the move from price 79 to price 80
        assert_eq!(cps[0].date, start() + Days::new(80));
        assert!(cps[0].price_change_pct().value().unwrap() > 40.0);
        assert!(cps[0].before_stats.trend.value().unwrap().abs() < 0.1);

        let pairs = session.correlations().unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].days_difference, 1);

        let impacts = session.impacts().unwrap();
        assert_eq!(impacts.results.len(), 1);
        assert!(impacts.results[0].significant);
        assert_eq!(session.stage(), Stage::Quantified);

        let posterior = session.posterior().unwrap();
        assert_eq!(posterior.parameters[0].prior.as_deref(), Some("DiscreteUniform[0, 159)"));
        let text = crate::report::format_run_summary(&session, 5);
        assert!(text.contains("DiscreteUniform[0, 159)"));
        assert!(text.contains("Supply shock"));
    }

    #[test]
    fn metropolis_run_locates_the_break() {
        let session = run_analysis(config(), series(), catalog(), &MetropolisSampler::default()).unwrap();
        let posterior = session.posterior().unwrap();
        assert_eq!(posterior.n_changepoints, 1);
        assert_eq!(posterior.parameters.len(), posterior.spec.n_parameters());
        assert!(posterior
            .parameters
            .iter()
            .all(|p| p.acceptance_rate.is_some_and(|a| (0.0..=1.0).contains(&a))));
        let cp = &session.change_points().unwrap()[0];
        assert!((cp.index as i64 - 79).abs() <= 2, "index {}", cp.index);
        assert!(session.export_manifest().is_none());
    }

    #[test]
    fn export_writes_every_table() {
        let dir = std::env::temp_dir().join(format!("price-breaks-export-{}", std::process::id()));
        let mut session = AnalysisSession::new(config());
        session.load(series(), catalog()).unwrap();
        session.build_model().unwrap();
        session.sample(&FixedSampler { tau: 79.0 }).unwrap();
        session.reduce().unwrap();
        session.correlate().unwrap();
        session.quantify().unwrap();
        session.export(&dir).unwrap();

        let manifest = session.export_manifest().unwrap();
        assert_eq!(manifest.files.len(), 5);
        assert!(manifest.files.iter().all(|f| f.exists()));
        let json = std::fs::read_to_string(dir.join("summary.json")).unwrap();
        assert!(json.contains("\"change_points\""));
        std::fs::remove_dir_all(&dir).ok();
    }
}
