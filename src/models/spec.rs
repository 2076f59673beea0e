//! Declarative change-point model specifications.
//!
//! A `ChangePointModelSpec` is one of four variants, each with its own fixed
//! parameter layout. The layout is resolved when the spec is built; the sampler only
//! ever sees a flat `&[f64]` whose meaning is given by [`ChangePointModelSpec::parameters`].
//!
//! Layouts (k = number of change points, P = number of periods):
//!
//! ```text
//! Single / Multiple : tau.. (k) | mu_1..mu_{k+1} | sigma  or  sigma_1..sigma_{k+1}
//! EventAugmented    : Multiple layout | beta_event
//! Hierarchical      : mu_global | sigma_global | per period p: tau_p{p} mu_p{p}_1 mu_p{p}_2 sigma_p{p}
//! ```
//!
//! Discrete locations are stored as whole numbers inside the `f64` vector.

use std::collections::BTreeMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::ModelSpecError;
use crate::models::likelihood::{SegmentAssignment, SufficientStats};
use crate::models::prior::Prior;

/// Smallest return sequence a change-point model accepts.
pub const MIN_OBSERVATIONS: usize = 3;

/// Floor for data-derived starting scales.
const MIN_START_SCALE: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    Location,
    Mean,
    Scale,
    Effect,
    HyperMean,
    HyperScale,
}

impl ParameterKind {
    pub fn is_positive(self) -> bool {
        matches!(self, ParameterKind::Scale | ParameterKind::HyperScale)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDecl {
    pub name: String,
    pub kind: ParameterKind,
    pub prior: Prior,
}

/// Prior widths shared by every variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorScales {
    /// `mu_* ~ Normal(0, mean_sigma)`
    pub mean_sigma: f64,
    /// `sigma_* ~ HalfNormal(scale_sigma)`
    pub scale_sigma: f64,
    /// `beta_event ~ Normal(0, effect_sigma)`
    pub effect_sigma: f64,
}

impl Default for PriorScales {
    fn default() -> Self {
        Self {
            mean_sigma: 1.0,
            scale_sigma: 1.0,
            effect_sigma: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleLayout {
    Shared,
    PerRegime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentedSpec {
    pub n_obs: usize,
    pub n_changepoints: usize,
    pub scales: ScaleLayout,
    pub priors: PriorScales,
}

impl SegmentedSpec {
    fn n_scales(&self) -> usize {
        match self.scales {
            ScaleLayout::Shared => 1,
            ScaleLayout::PerRegime => self.n_changepoints + 1,
        }
    }

    fn len(&self) -> usize {
        self.n_changepoints + (self.n_changepoints + 1) + self.n_scales()
    }

    fn mean_offset(&self) -> usize {
        self.n_changepoints
    }

    fn scale_offset(&self) -> usize {
        2 * self.n_changepoints + 1
    }

    fn location_name(&self, j: usize) -> String {
        if self.n_changepoints == 1 {
            "tau".to_string()
        } else {
            format!("tau_{}", j + 1)
        }
    }

    fn declarations(&self) -> Vec<ParameterDecl> {
        let k = self.n_changepoints;
        let mut out = Vec::with_capacity(self.len() + 1);
        for j in 0..k {
            out.push(ParameterDecl {
                name: self.location_name(j),
                kind: ParameterKind::Location,
                prior: Prior::DiscreteUniform {
                    lower: 0,
                    upper: self.n_obs,
                },
            });
        }
        for s in 0..=k {
            out.push(ParameterDecl {
                name: format!("mu_{}", s + 1),
                kind: ParameterKind::Mean,
                prior: Prior::Normal {
                    mu: 0.0,
                    sigma: self.priors.mean_sigma,
                },
            });
        }
        let scale_prior = Prior::HalfNormal {
            sigma: self.priors.scale_sigma,
        };
        match self.scales {
            ScaleLayout::Shared => out.push(ParameterDecl {
                name: "sigma".to_string(),
                kind: ParameterKind::Scale,
                prior: scale_prior,
            }),
            ScaleLayout::PerRegime => {
                for s in 0..=k {
                    out.push(ParameterDecl {
                        name: format!("sigma_{}", s + 1),
                        kind: ParameterKind::Scale,
                        prior: scale_prior.clone(),
                    });
                }
            }
        }
        out
    }

    fn assignment(&self, theta: &[f64]) -> SegmentAssignment {
        SegmentAssignment::from_boundaries(theta[..self.n_changepoints].iter().map(|&t| to_index(t)).collect())
    }

    fn log_likelihood(&self, theta: &[f64], stats: &SufficientStats, beta: f64) -> f64 {
        let ranges = self.assignment(theta).ranges(self.n_obs);
        let mut ll = 0.0;
        for (s, r) in ranges.into_iter().enumerate() {
            let mu = theta[self.mean_offset() + s];
            let sigma = match self.scales {
                ScaleLayout::Shared => theta[self.scale_offset()],
                ScaleLayout::PerRegime => theta[self.scale_offset() + s],
            };
            ll += stats.segment_log_likelihood(r, mu, beta, sigma);
        }
        ll
    }

    fn initial_point(&self, stats: &SufficientStats) -> Vec<f64> {
        let k = self.n_changepoints;
        let n = self.n_obs;
        let locations: Vec<usize> = (0..k).map(|j| (j + 1) * n / (k + 1)).collect();
        let ranges = SegmentAssignment::from_boundaries(locations.clone()).ranges(n);
        let overall = stats.std(&(0..n)).unwrap_or(MIN_START_SCALE).max(MIN_START_SCALE);

        let mut theta: Vec<f64> = locations.iter().map(|&l| l as f64).collect();
        theta.extend(ranges.iter().map(|r| stats.mean(r).unwrap_or(0.0)));
        match self.scales {
            ScaleLayout::Shared => theta.push(overall),
            ScaleLayout::PerRegime => theta.extend(
                ranges
                    .iter()
                    .map(|r| stats.std(r).unwrap_or(overall).max(MIN_START_SCALE)),
            ),
        }
        theta
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventAugmentedSpec {
    pub segmented: SegmentedSpec,
    /// 0/1 per return: 1 where an event's trading date falls.
    pub indicator: Vec<f64>,
}

/// A calendar bucket of the return sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub label: String,
    pub range: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchicalSpec {
    pub n_obs: usize,
    pub periods: Vec<Period>,
    pub priors: PriorScales,
}

impl HierarchicalSpec {
    const PER_PERIOD: usize = 4;
    const HYPER: usize = 2;

    fn len(&self) -> usize {
        Self::HYPER + Self::PER_PERIOD * self.periods.len()
    }

    fn offset(&self, p: usize) -> usize {
        Self::HYPER + Self::PER_PERIOD * p
    }

    fn declarations(&self) -> Vec<ParameterDecl> {
        let mut out = Vec::with_capacity(self.len());
        out.push(ParameterDecl {
            name: "mu_global".to_string(),
            kind: ParameterKind::HyperMean,
            prior: Prior::Normal {
                mu: 0.0,
                sigma: self.priors.mean_sigma,
            },
        });
        out.push(ParameterDecl {
            name: "sigma_global".to_string(),
            kind: ParameterKind::HyperScale,
            prior: Prior::HalfNormal {
                sigma: self.priors.scale_sigma,
            },
        });
        let pooled = Prior::Hierarchical {
            loc: "mu_global".to_string(),
            scale: "sigma_global".to_string(),
        };
        for (p, period) in self.periods.iter().enumerate() {
            let tag = p + 1;
            out.push(ParameterDecl {
                name: format!("tau_p{tag}"),
                kind: ParameterKind::Location,
                prior: Prior::DiscreteUniform {
                    lower: period.range.start,
                    upper: period.range.end,
                },
            });
            for j in 1..=2 {
                out.push(ParameterDecl {
                    name: format!("mu_p{tag}_{j}"),
                    kind: ParameterKind::Mean,
                    prior: pooled.clone(),
                });
            }
            out.push(ParameterDecl {
                name: format!("sigma_p{tag}"),
                kind: ParameterKind::Scale,
                prior: Prior::HalfNormal {
                    sigma: self.priors.scale_sigma,
                },
            });
        }
        out
    }

    /// Boundaries `[tau_1, start_2, tau_2, start_3, ...]`: every period contributes a
    /// break at its location, and every period after the first starts a new pair of
    /// segments.
    fn assignment(&self, theta: &[f64]) -> SegmentAssignment {
        let mut boundaries = Vec::with_capacity(2 * self.periods.len());
        for (p, period) in self.periods.iter().enumerate() {
            if p > 0 {
                boundaries.push(period.range.start);
            }
            boundaries.push(to_index(theta[self.offset(p)]));
        }
        SegmentAssignment::from_boundaries(boundaries)
    }

    fn log_likelihood(&self, theta: &[f64], stats: &SufficientStats) -> f64 {
        let mut ll = 0.0;
        for (p, period) in self.periods.iter().enumerate() {
            let o = self.offset(p);
            let tau = to_index(theta[o]).clamp(period.range.start, period.range.end);
            let sigma = theta[o + 3];
            ll += stats.segment_log_likelihood(period.range.start..tau, theta[o + 1], 0.0, sigma);
            ll += stats.segment_log_likelihood(tau..period.range.end, theta[o + 2], 0.0, sigma);
        }
        ll
    }

    fn initial_point(&self, stats: &SufficientStats) -> Vec<f64> {
        let mut per_period = Vec::with_capacity(Self::PER_PERIOD * self.periods.len());
        let mut means = Vec::with_capacity(2 * self.periods.len());
        let overall = stats
            .std(&(0..self.n_obs))
            .unwrap_or(MIN_START_SCALE)
            .max(MIN_START_SCALE);
        for period in &self.periods {
            let r = &period.range;
            let tau = r.start + (r.end - r.start) / 2;
            let m1 = stats.mean(&(r.start..tau)).unwrap_or(0.0);
            let m2 = stats.mean(&(tau..r.end)).unwrap_or(m1);
            let sigma = stats.std(r).unwrap_or(overall).max(MIN_START_SCALE);
            per_period.extend_from_slice(&[tau as f64, m1, m2, sigma]);
            means.extend_from_slice(&[m1, m2]);
        }
        let mu_global = means.iter().sum::<f64>() / means.len().max(1) as f64;
        let spread = (means.iter().map(|m| (m - mu_global).powi(2)).sum::<f64>() / means.len().max(1) as f64).sqrt();
        let mut theta = vec![mu_global, spread.max(overall)];
        theta.extend(per_period);
        theta
    }
}

/// The four supported model families.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum ChangePointModelSpec {
    Single(SegmentedSpec),
    Multiple(SegmentedSpec),
    EventAugmented(EventAugmentedSpec),
    Hierarchical(HierarchicalSpec),
}

fn to_index(value: f64) -> usize {
    if value.is_finite() && value > 0.0 {
        value.round() as usize
    } else {
        0
    }
}

impl ChangePointModelSpec {
    pub fn label(&self) -> &'static str {
        match self {
            ChangePointModelSpec::Single(_) => "single",
            ChangePointModelSpec::Multiple(_) => "multiple",
            ChangePointModelSpec::EventAugmented(_) => "event-augmented",
            ChangePointModelSpec::Hierarchical(_) => "hierarchical",
        }
    }

    pub fn n_obs(&self) -> usize {
        match self {
            ChangePointModelSpec::Single(s) | ChangePointModelSpec::Multiple(s) => s.n_obs,
            ChangePointModelSpec::EventAugmented(e) => e.segmented.n_obs,
            ChangePointModelSpec::Hierarchical(h) => h.n_obs,
        }
    }

    pub fn n_segments(&self) -> usize {
        match self {
            ChangePointModelSpec::Single(s) | ChangePointModelSpec::Multiple(s) => s.n_changepoints + 1,
            ChangePointModelSpec::EventAugmented(e) => e.segmented.n_changepoints + 1,
            ChangePointModelSpec::Hierarchical(h) => 2 * h.periods.len(),
        }
    }

    /// Every parameter in vector order.
    pub fn parameters(&self) -> Vec<ParameterDecl> {
        match self {
            ChangePointModelSpec::Single(s) | ChangePointModelSpec::Multiple(s) => s.declarations(),
            ChangePointModelSpec::EventAugmented(e) => {
                let mut decls = e.segmented.declarations();
                decls.push(ParameterDecl {
                    name: "beta_event".to_string(),
                    kind: ParameterKind::Effect,
                    prior: Prior::Normal {
                        mu: 0.0,
                        sigma: e.segmented.priors.effect_sigma,
                    },
                });
                decls
            }
            ChangePointModelSpec::Hierarchical(h) => h.declarations(),
        }
    }

    pub fn n_parameters(&self) -> usize {
        match self {
            ChangePointModelSpec::Single(s) | ChangePointModelSpec::Multiple(s) => s.len(),
            ChangePointModelSpec::EventAugmented(e) => e.segmented.len() + 1,
            ChangePointModelSpec::Hierarchical(h) => h.len(),
        }
    }

    pub fn priors(&self) -> BTreeMap<String, Prior> {
        self.parameters().into_iter().map(|d| (d.name, d.prior)).collect()
    }

    /// Names of the change-point location parameters, in declaration order.
    pub fn location_names(&self) -> Vec<String> {
        self.parameters()
            .into_iter()
            .filter(|d| d.kind == ParameterKind::Location)
            .map(|d| d.name)
            .collect()
    }

    pub fn validate(&self) -> Result<(), ModelSpecError> {
        let n = self.n_obs();
        if n < MIN_OBSERVATIONS {
            return Err(ModelSpecError::TooFewObservations(n));
        }
        match self {
            ChangePointModelSpec::Single(s) | ChangePointModelSpec::Multiple(s) => validate_segmented(s)?,
            ChangePointModelSpec::EventAugmented(e) => {
                validate_segmented(&e.segmented)?;
                if e.indicator.len() != n {
                    return Err(ModelSpecError::IndicatorLength {
                        expected: n,
                        actual: e.indicator.len(),
                    });
                }
            }
            ChangePointModelSpec::Hierarchical(h) => validate_periods(h)?,
        }

        for decl in self.parameters() {
            decl.prior.validate(&decl.name)?;
            if let Prior::DiscreteUniform { upper, .. } = decl.prior {
                if upper > n {
                    return Err(ModelSpecError::InvalidPrior {
                        parameter: decl.name,
                        reason: format!("support ends at {upper}, beyond the {n} observations"),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_len(&self, theta: &[f64]) -> Result<(), ModelSpecError> {
        let expected = self.n_parameters();
        if theta.len() != expected {
            return Err(ModelSpecError::ParameterLength {
                expected,
                actual: theta.len(),
            });
        }
        Ok(())
    }

    /// Segment assignment implied by one parameter vector.
    pub fn segment_assignment(&self, theta: &[f64]) -> Result<SegmentAssignment, ModelSpecError> {
        self.check_len(theta)?;
        Ok(match self {
            ChangePointModelSpec::Single(s) | ChangePointModelSpec::Multiple(s) => s.assignment(theta),
            ChangePointModelSpec::EventAugmented(e) => e.segmented.assignment(theta),
            ChangePointModelSpec::Hierarchical(h) => h.assignment(theta),
        })
    }

    /// Attach observed returns, producing an evaluable posterior.
    pub fn bind(&self, y: &[f64]) -> Result<BoundModel<'_>, ModelSpecError> {
        self.validate()?;
        if y.len() != self.n_obs() {
            return Err(ModelSpecError::ParameterLength {
                expected: self.n_obs(),
                actual: y.len(),
            });
        }
        let indicator = match self {
            ChangePointModelSpec::EventAugmented(e) => Some(e.indicator.as_slice()),
            _ => None,
        };
        Ok(BoundModel {
            spec: self,
            stats: SufficientStats::new(y, indicator),
            decls: self.parameters(),
        })
    }
}

fn validate_segmented(s: &SegmentedSpec) -> Result<(), ModelSpecError> {
    if s.n_changepoints == 0 {
        return Err(ModelSpecError::TooFewSegments {
            required: 2,
            actual: 1,
        });
    }
    if s.n_changepoints >= s.n_obs {
        return Err(ModelSpecError::TooFewObservations(s.n_obs));
    }
    Ok(())
}

fn validate_periods(h: &HierarchicalSpec) -> Result<(), ModelSpecError> {
    if h.periods.is_empty() {
        return Err(ModelSpecError::TooFewSegments {
            required: 2,
            actual: 0,
        });
    }
    let mut expected_start = 0;
    for (p, period) in h.periods.iter().enumerate() {
        if period.range.start != expected_start || period.range.is_empty() {
            return Err(ModelSpecError::EmptyPeriod { period: p + 1 });
        }
        expected_start = period.range.end;
    }
    if expected_start != h.n_obs {
        return Err(ModelSpecError::EmptyPeriod {
            period: h.periods.len(),
        });
    }
    Ok(())
}

/// A spec together with the sufficient statistics of its observations.
#[derive(Debug, Clone)]
pub struct BoundModel<'a> {
    spec: &'a ChangePointModelSpec,
    stats: SufficientStats,
    decls: Vec<ParameterDecl>,
}

impl BoundModel<'_> {
    pub fn spec(&self) -> &ChangePointModelSpec {
        self.spec
    }

    pub fn parameters(&self) -> &[ParameterDecl] {
        &self.decls
    }

    pub fn n_obs(&self) -> usize {
        self.stats.len()
    }

    pub fn log_prior(&self, theta: &[f64]) -> f64 {
        if theta.len() != self.decls.len() {
            return f64::NEG_INFINITY;
        }
        let mut lp = 0.0;
        match self.spec {
            ChangePointModelSpec::Hierarchical(_) => {
                let (loc, scale) = (theta[0], theta[1]);
                for (decl, &x) in self.decls.iter().zip(theta) {
                    lp += decl.prior.log_density_given(x, loc, scale);
                }
            }
            _ => {
                for (decl, &x) in self.decls.iter().zip(theta) {
                    lp += decl.prior.log_density(x);
                }
            }
        }
        lp
    }

    pub fn log_likelihood(&self, theta: &[f64]) -> f64 {
        if theta.len() != self.decls.len() {
            return f64::NEG_INFINITY;
        }
        match self.spec {
            ChangePointModelSpec::Single(s) | ChangePointModelSpec::Multiple(s) => {
                s.log_likelihood(theta, &self.stats, 0.0)
            }
            ChangePointModelSpec::EventAugmented(e) => {
                let beta = theta[e.segmented.len()];
                e.segmented.log_likelihood(theta, &self.stats, beta)
            }
            ChangePointModelSpec::Hierarchical(h) => h.log_likelihood(theta, &self.stats),
        }
    }

    /// Unnormalised log posterior; `-inf` outside the prior support.
    pub fn log_posterior(&self, theta: &[f64]) -> f64 {
        let lp = self.log_prior(theta);
        if lp == f64::NEG_INFINITY {
            return lp;
        }
        lp + self.log_likelihood(theta)
    }

    /// A data-informed starting point inside the prior support.
    pub fn initial_point(&self) -> Vec<f64> {
        match self.spec {
            ChangePointModelSpec::Single(s) | ChangePointModelSpec::Multiple(s) => s.initial_point(&self.stats),
            ChangePointModelSpec::EventAugmented(e) => {
                let mut theta = e.segmented.initial_point(&self.stats);
                theta.push(0.0);
                theta
            }
            ChangePointModelSpec::Hierarchical(h) => h.initial_point(&self.stats),
        }
    }
}
