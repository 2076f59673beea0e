//! Reporting utilities: impact rankings and formatted terminal output.

pub mod format;

pub use format::*;

use crate::impact::ImpactResult;

/// Largest rises and falls among the quantified events (top-N each side).
#[derive(Debug, Clone)]
pub struct ImpactRankings<'a> {
    pub increases: Vec<&'a ImpactResult>,
    pub decreases: Vec<&'a ImpactResult>,
}

/// Rank events by price change; events with an undefined change are left out.
pub fn rank_impacts(results: &[ImpactResult], top_n: usize) -> ImpactRankings<'_> {
    let mut defined: Vec<(&ImpactResult, f64)> = results
        .iter()
        .filter_map(|r| r.price_change_pct().value().map(|v| (r, v)))
        .collect();
    defined.sort_by(|a, b| b.1.total_cmp(&a.1));

    let increases = defined
        .iter()
        .filter(|(_, v)| *v > 0.0)
        .take(top_n)
        .map(|(r, _)| *r)
        .collect();
    let decreases = defined
        .iter()
        .rev()
        .filter(|(_, v)| *v < 0.0)
        .take(top_n)
        .map(|(r, _)| *r)
        .collect();

    ImpactRankings { increases, decreases }
}
