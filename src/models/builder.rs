//! Builds a `ChangePointModelSpec` from configuration and observed data.
//!
//! Only the spec is produced here; no inference happens until a sampler is given
//! the spec together with the returns.

use chrono::Datelike;
use log::debug;

use crate::domain::{AnalysisConfig, EventRecord, ModelChoice, ReturnPoint};
use crate::error::ModelSpecError;
use crate::models::spec::{
    ChangePointModelSpec, EventAugmentedSpec, HierarchicalSpec, Period, PriorScales, ScaleLayout, SegmentedSpec,
};
use crate::series::window::nearest_index;

/// Build and validate the model requested by `config` with `n_changepoints` breaks.
///
/// `events` are only consulted by the event-augmented variant.
pub fn build_model(
    config: &AnalysisConfig,
    n_changepoints: usize,
    returns: &[ReturnPoint],
    events: &[EventRecord],
) -> Result<ChangePointModelSpec, ModelSpecError> {
    let n_obs = returns.len();
    let scales = if config.regime_scales {
        ScaleLayout::PerRegime
    } else {
        ScaleLayout::Shared
    };
    let segmented = |k: usize| SegmentedSpec {
        n_obs,
        n_changepoints: k,
        scales,
        priors: PriorScales::default(),
    };

    let spec = match config.model {
        ModelChoice::Single => ChangePointModelSpec::Single(segmented(1)),
        ModelChoice::Multiple => ChangePointModelSpec::Multiple(segmented(n_changepoints)),
        ModelChoice::EventAugmented => {
            let indicator = event_indicator(returns, events);
            debug!(
                "event indicator marks {} of {} returns",
                indicator.iter().filter(|v| **v > 0.0).count(),
                n_obs
            );
            ChangePointModelSpec::EventAugmented(EventAugmentedSpec {
                segmented: segmented(n_changepoints),
                indicator,
            })
        }
        ModelChoice::Hierarchical => ChangePointModelSpec::Hierarchical(HierarchicalSpec {
            n_obs,
            periods: calendar_periods(returns, config.period_years),
            priors: PriorScales::default(),
        }),
    };

    spec.validate()?;
    Ok(spec)
}

/// 0/1 per return: 1 at the nearest trading date of every event inside the series'
/// date range. Events outside the range mark nothing.
pub fn event_indicator(returns: &[ReturnPoint], events: &[EventRecord]) -> Vec<f64> {
    let mut indicator = vec![0.0; returns.len()];
    let (Some(first), Some(last)) = (returns.first(), returns.last()) else {
        return indicator;
    };
    let dates: Vec<_> = returns.iter().map(|r| r.date).collect();
    for event in events {
        if event.date < first.date || event.date > last.date {
            continue;
        }
        if let Some(i) = nearest_index(&dates, event.date) {
            indicator[i] = 1.0;
        }
    }
    indicator
}

/// Split the return sequence into calendar buckets of `years` years, aligned to
/// multiples of `years` (decades for the default of 10). A zero width is treated as 1.
pub fn calendar_periods(returns: &[ReturnPoint], years: u32) -> Vec<Period> {
    let width = years.max(1) as i32;
    let bucket = |r: &ReturnPoint| r.date.year().div_euclid(width) * width;

    let mut periods: Vec<Period> = Vec::new();
    let mut start = 0;
    for i in 1..=returns.len() {
        if i == returns.len() || bucket(&returns[i]) != bucket(&returns[start]) {
            let first_year = bucket(&returns[start]);
            periods.push(Period {
                label: format!("{}-{}", first_year, first_year + width - 1),
                range: start..i,
            });
            start = i;
        }
    }
    periods
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::domain::{EventCategory, ExpectedDirection};

    fn returns_from(start: NaiveDate, n: usize, step_days: u64) -> Vec<ReturnPoint> {
        (0..n)
            .map(|i| ReturnPoint {
                date: start + chrono::Days::new(i as u64 * step_days),
                log_return: 0.001 * (i % 3) as f64,
            })
            .collect()
    }

    fn event(date: NaiveDate) -> EventRecord {
        EventRecord {
            date,
            name: "test".into(),
            category: EventCategory::Opec,
            region: "Global".into(),
            expected_direction: ExpectedDirection::Negative,
            description: String::new(),
        }
    }

    #[test]
    fn indicator_marks_nearest_date_inside_coverage() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let returns = returns_from(start, 10, 2);
        let events = [
            event(NaiveDate::from_ymd_opt(2020, 1, 4).unwrap()),
            event(NaiveDate::from_ymd_opt(2019, 12, 1).unwrap()),
            event(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()),
        ];
        let ind = event_indicator(&returns, &events);
        // Jan 4 is one day from both Jan 3 and Jan 5: earlier wins.
        assert_eq!(ind[1], 1.0);
        assert_eq!(ind.iter().sum::<f64>(), 1.0);
    }

    #[test]
    fn decades_split_the_sequence() {
        let start = NaiveDate::from_ymd_opt(1998, 6, 1).unwrap();
        let returns = returns_from(start, 40, 120);
        let periods = calendar_periods(&returns, 10);
        assert!(periods.len() >= 2);
        assert_eq!(periods[0].label, "1990-1999");
        assert_eq!(periods[1].label, "2000-2009");
        assert_eq!(periods[0].range.start, 0);
        assert_eq!(periods.last().unwrap().range.end, 40);
        assert!(periods.windows(2).all(|w| w[0].range.end == w[1].range.start));
    }

    #[test]
    fn builds_each_variant() {
        let returns = returns_from(NaiveDate::from_ymd_opt(2005, 1, 1).unwrap(), 60, 90);
        let events = [event(NaiveDate::from_ymd_opt(2008, 9, 15).unwrap())];
        for model in [
            ModelChoice::Single,
            ModelChoice::Multiple,
            ModelChoice::EventAugmented,
            ModelChoice::Hierarchical,
        ] {
            let config = AnalysisConfig {
                model,
                ..AnalysisConfig::default()
            };
            let spec = build_model(&config, 2, &returns, &events).unwrap();
            assert_eq!(spec.n_obs(), 60);
            if model == ModelChoice::Single {
                assert_eq!(spec.n_segments(), 2);
            }
        }
    }

    #[test]
    fn zero_changepoints_is_rejected() {
        let returns = returns_from(NaiveDate::from_ymd_opt(2005, 1, 1).unwrap(), 20, 1);
        let config = AnalysisConfig {
            model: ModelChoice::Multiple,
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            build_model(&config, 0, &returns, &[]),
            Err(ModelSpecError::TooFewSegments { .. })
        ));
    }
}
