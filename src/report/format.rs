//! Plain-text terminal output.
//!
//! All formatting lives here so the analysis code stays free of presentation and
//! output changes stay local.

use crate::app::pipeline::AnalysisSession;
use crate::domain::{ChangePointEstimate, EventCorrelation, EventRecord, Measure};
use crate::events::CatalogStats;
use crate::impact::{ImpactAnalysis, ImpactResult};
use crate::report::{rank_impacts, ImpactRankings};

fn fmt_measure(m: Measure, decimals: usize) -> String {
    match m {
        Measure::Defined(v) => format!("{v:.decimals$}"),
        Measure::Undefined(_) => "n/a".to_string(),
    }
}

fn fmt_p(m: Measure) -> String {
    match m {
        Measure::Defined(p) if p < 1e-4 => "<1e-4".to_string(),
        other => fmt_measure(other, 4),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

fn rule(widths: &[usize]) -> String {
    widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Everything a completed (at least `QUANTIFIED`) session knows, as text.
pub fn format_run_summary(session: &AnalysisSession, top_n: usize) -> String {
    let mut out = String::new();
    out.push_str("=== breaks - change points and event impacts ===\n");

    if let Some(data) = session.data() {
        out.push_str(&format!(
            "Prices: n={} | {} to {} | events in catalog: {}\n",
            data.series.len(),
            data.series.first_date().map(|d| d.to_string()).unwrap_or_default(),
            data.series.last_date().map(|d| d.to_string()).unwrap_or_default(),
            data.catalog.len()
        ));
    }

    if let Some(posterior) = session.posterior() {
        out.push_str("\nModel selection:\n");
        for score in &posterior.scores {
            let chosen = if score.n_changepoints == posterior.n_changepoints { "*" } else { " " };
            out.push_str(&format!(
                "{chosen} k={:<3} logL={:.3} params={} BIC={:.3}\n",
                score.n_changepoints, score.log_likelihood, score.n_parameters, score.bic
            ));
        }
        out.push_str(&format!(
            "Model: {} | converged: {}\n",
            posterior.spec.label(),
            if posterior.convergence.converged { "yes" } else { "no" }
        ));
        for warning in &posterior.convergence.warnings {
            out.push_str(&format!("  warning: {warning}\n"));
        }

        out.push_str("\nPosterior:\n");
        out.push_str(&format!(
            "{:<14} {:>10} {:>10} {:>10} {:>10} {:>7} {:>8} {:>6}  {}\n",
            "parameter", "mean", "sd", "q5", "q95", "r_hat", "ess", "accept", "prior"
        ));
        out.push_str(&rule(&[14, 10, 10, 10, 10, 7, 8, 6, 24]));
        out.push('\n');
        for p in &posterior.parameters {
            out.push_str(&format!(
                "{:<14} {:>10.4} {:>10} {:>10.4} {:>10.4} {:>7} {:>8} {:>6}  {}\n",
                truncate(&p.name, 14),
                p.mean,
                fmt_measure(p.sd, 4),
                p.q5,
                p.q95,
                fmt_measure(p.rhat, 3),
                fmt_measure(p.ess, 1),
                p.acceptance_rate.map_or_else(|| "n/a".to_string(), |a| format!("{a:.2}")),
                p.prior.as_deref().unwrap_or("")
            ));
        }
    }

    if let Some(cps) = session.change_points() {
        out.push_str("\nChange points:\n");
        out.push_str(&format_change_points(&cps));
    }
    if let Some(pairs) = session.correlations() {
        out.push_str(&format!("\nEvents within {} days:\n", session.config().tolerance_days));
        out.push_str(&format_correlations(&pairs, top_n));
    }
    if let Some(impacts) = session.impacts() {
        out.push('\n');
        out.push_str(&format_impacts(&impacts, top_n));
    }
    out
}

pub fn format_change_points(cps: &[ChangePointEstimate]) -> String {
    let mut out = format!(
        "{:<10} {:<10} {:<23} {:>9} {:>9} {:>8} {:>10}\n",
        "parameter", "date", "90% interval", "before", "after", "change%", "vol_change"
    );
    out.push_str(&rule(&[10, 10, 23, 9, 9, 8, 10]));
    out.push('\n');
    for cp in cps {
        out.push_str(&format!(
            "{:<10} {:<10} {:<23} {:>9} {:>9} {:>8} {:>10}\n",
            truncate(&cp.parameter, 10),
            cp.date,
            format!("{} - {}", cp.credible_interval.0, cp.credible_interval.1),
            fmt_measure(cp.before_stats.mean_price, 2),
            fmt_measure(cp.after_stats.mean_price, 2),
            fmt_measure(cp.price_change_pct(), 2),
            fmt_measure(cp.volatility_change(), 5),
        ));
    }
    out
}

pub fn format_correlations(pairs: &[EventCorrelation], top_n: usize) -> String {
    if pairs.is_empty() {
        return "  (none)\n".to_string();
    }
    let mut out = String::new();
    for c in pairs.iter().take(top_n) {
        out.push_str(&format!(
            "  {} <-> {} {:<40} {:>3}d strength={:.3}\n",
            c.change_point.date,
            c.event.date,
            truncate(&c.event.name, 40),
            c.days_difference,
            c.correlation_strength
        ));
    }
    out
}

fn impact_rows(rows: &[&ImpactResult]) -> String {
    let mut out = format!(
        "{:<10} {:<32} {:<14} {:>8} {:>8} {:>9} {:>4}\n",
        "date", "event", "category", "change%", "p", "effect", "sig"
    );
    out.push_str(&rule(&[10, 32, 14, 8, 8, 9, 4]));
    out.push('\n');
    for r in rows {
        out.push_str(&format!(
            "{:<10} {:<32} {:<14} {:>8} {:>8} {:>9} {:>4}\n",
            r.event.date,
            truncate(&r.event.name, 32),
            truncate(r.event.category.label(), 14),
            fmt_measure(r.price_change_pct(), 2),
            fmt_p(r.significance.t_test.p_value),
            fmt_measure(r.regression_effect(), 2),
            if r.significant { "*" } else { "" },
        ));
    }
    out
}

pub fn format_impacts(analysis: &ImpactAnalysis, top_n: usize) -> String {
    let mut out = String::from("Event impacts:\n");
    let rows: Vec<&ImpactResult> = analysis.results.iter().collect();
    out.push_str(&impact_rows(&rows));
    for s in &analysis.skipped {
        out.push_str(&format!("  (skipped {}) {}\n", s.event.name, s.reason));
    }

    let ImpactRankings { increases, decreases } = rank_impacts(&analysis.results, top_n);
    if !increases.is_empty() {
        out.push_str("\nLargest increases:\n");
        out.push_str(&impact_rows(&increases));
    }
    if !decreases.is_empty() {
        out.push_str("\nLargest decreases:\n");
        out.push_str(&impact_rows(&decreases));
    }

    let s = &analysis.summary;
    out.push_str(&format!(
        "\nSummary: {} events, {} significant | mean {}% median {}% sd {}% | up {} down {}\n",
        s.total_events,
        s.significant_events,
        fmt_measure(s.mean_price_change_pct, 2),
        fmt_measure(s.median_price_change_pct, 2),
        fmt_measure(s.std_price_change_pct, 2),
        s.positive_impacts,
        s.negative_impacts
    ));
    for (category, g) in &s.by_category {
        out.push_str(&format!(
            "  {:<20} n={:<3} significant={:<3} mean change {}%\n",
            truncate(category, 20),
            g.events,
            g.significant,
            fmt_measure(g.mean_price_change_pct, 2)
        ));
    }

    let a = &analysis.aggregate;
    out.push_str(&format!(
        "Across events: t={} (p={}) | Wilcoxon W={} (p={}) | Shapiro-Wilk W={} (p={}) | d={}\n",
        fmt_measure(a.t_test.statistic, 3),
        fmt_p(a.t_test.p_value),
        fmt_measure(a.wilcoxon.statistic, 1),
        fmt_p(a.wilcoxon.p_value),
        fmt_measure(a.normality.statistic, 3),
        fmt_p(a.normality.p_value),
        fmt_measure(a.cohens_d, 3),
    ));
    let x = &analysis.cross_event;
    out.push_str(&format!(
        "Event-day effect on returns: {} (p={}) | R2 {} vs {} without events\n",
        fmt_measure(x.effect, 5),
        fmt_p(x.p_value),
        fmt_measure(x.r_squared, 4),
        fmt_measure(x.r_squared_without_event, 4),
    ));
    out
}

pub fn format_catalog(events: &[EventRecord], stats: &CatalogStats) -> String {
    let mut out = format!(
        "{:<10} {:<44} {:<16} {:<22} {:<9}\n",
        "date", "event", "category", "region", "expected"
    );
    out.push_str(&rule(&[10, 44, 16, 22, 9]));
    out.push('\n');
    for e in events {
        out.push_str(&format!(
            "{:<10} {:<44} {:<16} {:<22} {:<9}\n",
            e.date,
            truncate(&e.name, 44),
            truncate(e.category.label(), 16),
            truncate(&e.region, 22),
            e.expected_direction.label()
        ));
    }
    out.push_str(&format!("\n{} events", stats.total_events));
    if let Some((first, last)) = stats.date_range {
        out.push_str(&format!(" from {first} to {last}"));
    }
    out.push('\n');
    for (category, n) in &stats.categories {
        out.push_str(&format!("  {category}: {n}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::{Days, NaiveDate};

    use super::*;
    use crate::domain::{EventCategory, ExpectedDirection, PricePoint};
    use crate::events::EventCatalog;
    use crate::impact::{analyze_events, ImpactSettings};
    use crate::series::PriceSeries;

    fn analysis() -> ImpactAnalysis {
        let start = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();
        let points = (0..90u64)
            .map(|i| PricePoint {
                date: start + Days::new(i),
                price: match i {
                    0..30 => 70.0,
                    30..60 => 84.0,
                    _ => 63.0,
                } + if i % 2 == 0 { 0.5 } else { -0.5 },
            })
            .collect();
        let series = PriceSeries::new(points).unwrap();
        let event = |name: &str, offset: u64| EventRecord {
            date: start + Days::new(offset),
            name: name.into(),
            category: EventCategory::Sanctions,
            region: "Europe".into(),
            expected_direction: ExpectedDirection::Mixed,
            description: String::new(),
        };
        let events = [event("embargo", 30), event("release", 60)];
        analyze_events(
            &series,
            &events,
            ImpactSettings {
                window_days: 30,
                significance_threshold: 0.05,
            },
        )
        .unwrap()
    }

    #[test]
    fn rankings_split_by_sign() {
        let a = analysis();
        let ranked = rank_impacts(&a.results, 5);
        assert_eq!(ranked.increases.len(), 1);
        assert_eq!(ranked.increases[0].event.name, "embargo");
        assert_eq!(ranked.decreases.len(), 1);
        assert_eq!(ranked.decreases[0].event.name, "release");
        assert!(rank_impacts(&a.results, 0).increases.is_empty());
    }

    #[test]
    fn impact_table_lists_every_event() {
        let text = format_impacts(&analysis(), 3);
        assert!(text.contains("embargo"));
        assert!(text.contains("release"));
        assert!(text.contains("Largest decreases:"));
        assert!(text.contains("2 events, 2 significant"));
    }

    #[test]
    fn catalog_listing_counts_events() {
        let catalog = EventCatalog::builtin();
        let text = format_catalog(catalog.events(), &catalog.statistics());
        assert!(text.contains("Iraq invades Kuwait"));
        assert!(text.contains("14 events from 1990-08-02 to 2022-10-05"));
    }

    #[test]
    fn long_names_are_truncated() {
        assert_eq!(truncate("abcdef", 4), "abc.");
        assert_eq!(truncate("abc", 4), "abc");
        assert_eq!(fmt_p(Measure::Defined(0.0)), "<1e-4");
    }
}
