//! Batch-level summary of per-event impacts.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{Measure, Undefined};
use crate::impact::ImpactResult;
use crate::math::stats;

/// Counts and mean change for one group of events.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroupSummary {
    pub events: usize,
    pub significant: usize,
    pub mean_price_change_pct: Measure,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactSummary {
    pub total_events: usize,
    pub significant_events: usize,
    pub mean_price_change_pct: Measure,
    pub median_price_change_pct: Measure,
    pub std_price_change_pct: Measure,
    pub max_price_change_pct: Measure,
    pub min_price_change_pct: Measure,
    pub positive_impacts: usize,
    pub negative_impacts: usize,
    pub by_category: BTreeMap<String, GroupSummary>,
    pub by_region: BTreeMap<String, GroupSummary>,
    pub by_direction: BTreeMap<String, GroupSummary>,
}

fn measure(value: Option<f64>) -> Measure {
    value.map_or(Measure::Undefined(Undefined::InsufficientData), Measure::Defined)
}

fn group_by(results: &[ImpactResult], key: impl Fn(&ImpactResult) -> String) -> BTreeMap<String, GroupSummary> {
    let mut groups: BTreeMap<String, Vec<&ImpactResult>> = BTreeMap::new();
    for r in results {
        groups.entry(key(r)).or_default().push(r);
    }
    groups
        .into_iter()
        .map(|(k, members)| {
            let changes: Vec<f64> = members.iter().filter_map(|r| r.price_change_pct().value()).collect();
            let summary = GroupSummary {
                events: members.len(),
                significant: members.iter().filter(|r| r.significant).count(),
                mean_price_change_pct: measure(stats::mean(&changes)),
            };
            (k, summary)
        })
        .collect()
}

/// Summary over `results`; undefined price changes are left out of the moments but
/// still counted in `total_events` and the group counts.
pub fn summarize_impacts(results: &[ImpactResult]) -> ImpactSummary {
    let changes: Vec<f64> = results.iter().filter_map(|r| r.price_change_pct().value()).collect();
    ImpactSummary {
        total_events: results.len(),
        significant_events: results.iter().filter(|r| r.significant).count(),
        mean_price_change_pct: measure(stats::mean(&changes)),
        median_price_change_pct: measure(stats::median(&changes)),
        std_price_change_pct: measure(stats::sample_std(&changes)),
        max_price_change_pct: measure(stats::max(&changes)),
        min_price_change_pct: measure(stats::min(&changes)),
        positive_impacts: changes.iter().filter(|c| **c > 0.0).count(),
        negative_impacts: changes.iter().filter(|c| **c < 0.0).count(),
        by_category: group_by(results, |r| r.event.category.label().to_string()),
        by_region: group_by(results, |r| r.event.region.clone()),
        by_direction: group_by(results, |r| r.event.expected_direction.label().to_string()),
    }
}
