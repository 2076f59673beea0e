//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - passed between pipeline stages as immutable artifacts
//! - exported to JSON/CSV
//! - asserted on directly in tests

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::Measure;

/// One observed price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// One log return, dated with the later of its two prices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnPoint {
    pub date: NaiveDate,
    pub log_return: f64,
}

/// Event category.
///
/// The catalog may be extended with categories this crate does not know; those are
/// kept verbatim in `Other` rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventCategory {
    Conflict,
    Opec,
    Sanctions,
    Economic,
    Infrastructure,
    Political,
    Other(String),
}

impl EventCategory {
    /// Parse a catalog label. Accepts the canonical names and the free-text labels
    /// used by the research catalog ("Military Conflict", "OPEC Policy", ...).
    pub fn from_label(label: &str) -> Self {
        let norm = label.trim().to_ascii_lowercase();
        match norm.as_str() {
            "conflict" | "military conflict" | "war" => EventCategory::Conflict,
            "opec" | "opec policy" | "opec+" => EventCategory::Opec,
            "sanctions" => EventCategory::Sanctions,
            "economic" | "economic crisis" => EventCategory::Economic,
            "infrastructure" => EventCategory::Infrastructure,
            "political" | "political unrest" => EventCategory::Political,
            _ => EventCategory::Other(label.trim().to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            EventCategory::Conflict => "CONFLICT",
            EventCategory::Opec => "OPEC",
            EventCategory::Sanctions => "SANCTIONS",
            EventCategory::Economic => "ECONOMIC",
            EventCategory::Infrastructure => "INFRASTRUCTURE",
            EventCategory::Political => "POLITICAL",
            EventCategory::Other(s) => s,
        }
    }
}

impl From<String> for EventCategory {
    fn from(value: String) -> Self {
        EventCategory::from_label(&value)
    }
}

impl From<EventCategory> for String {
    fn from(value: EventCategory) -> Self {
        value.label().to_string()
    }
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Expected direction of an event's price impact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExpectedDirection {
    Positive,
    Negative,
    Mixed,
    Other(String),
}

impl ExpectedDirection {
    pub fn from_label(label: &str) -> Self {
        let norm = label.trim().to_ascii_lowercase();
        match norm.as_str() {
            "positive" | "price increase" | "increase" | "up" => ExpectedDirection::Positive,
            "negative" | "price decrease" | "decrease" | "down" => ExpectedDirection::Negative,
            "mixed" | "price volatility" | "volatility" => ExpectedDirection::Mixed,
            _ => ExpectedDirection::Other(label.trim().to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ExpectedDirection::Positive => "POSITIVE",
            ExpectedDirection::Negative => "NEGATIVE",
            ExpectedDirection::Mixed => "MIXED",
            ExpectedDirection::Other(s) => s,
        }
    }
}

impl From<String> for ExpectedDirection {
    fn from(value: String) -> Self {
        ExpectedDirection::from_label(&value)
    }
}

impl From<ExpectedDirection> for String {
    fn from(value: ExpectedDirection) -> Self {
        value.label().to_string()
    }
}

impl std::fmt::Display for ExpectedDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A catalogued geopolitical/economic event. Immutable reference data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub date: NaiveDate,
    pub name: String,
    pub category: EventCategory,
    pub region: String,
    pub expected_direction: ExpectedDirection,
    pub description: String,
}

/// Descriptive statistics of one window of prices.
///
/// `mean_volatility` is the sample standard deviation of log returns inside the
/// window; `trend` is the OLS slope of price against the window-local index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeStats {
    pub observations: usize,
    pub mean_price: Measure,
    pub std_price: Measure,
    pub min_price: Measure,
    pub max_price: Measure,
    pub mean_volatility: Measure,
    pub trend: Measure,
}

/// Point estimate of one change point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangePointEstimate {
    /// Location parameter this estimate was reduced from (e.g. `tau`, `tau_1`).
    pub parameter: String,
    /// Position in the return sequence.
    pub index: usize,
    pub date: NaiveDate,
    pub credible_indices: (usize, usize),
    pub credible_interval: (NaiveDate, NaiveDate),
    pub before_stats: RegimeStats,
    pub after_stats: RegimeStats,
}

impl ChangePointEstimate {
    pub fn price_change_usd(&self) -> Measure {
        Measure::change(self.before_stats.mean_price, self.after_stats.mean_price)
    }

    pub fn price_change_pct(&self) -> Measure {
        Measure::pct_change(self.before_stats.mean_price, self.after_stats.mean_price)
    }

    pub fn volatility_change(&self) -> Measure {
        Measure::change(self.before_stats.mean_volatility, self.after_stats.mean_volatility)
    }
}

/// Flat export record for one detected change point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangePointResult {
    pub change_point_date: NaiveDate,
    pub price_change_usd: Measure,
    pub price_change_pct: Measure,
    pub volatility_change: Measure,
    pub before_mean_price: Measure,
    pub after_mean_price: Measure,
    pub before_volatility: Measure,
    pub after_volatility: Measure,
}

impl From<&ChangePointEstimate> for ChangePointResult {
    fn from(cp: &ChangePointEstimate) -> Self {
        Self {
            change_point_date: cp.date,
            price_change_usd: cp.price_change_usd(),
            price_change_pct: cp.price_change_pct(),
            volatility_change: cp.volatility_change(),
            before_mean_price: cp.before_stats.mean_price,
            after_mean_price: cp.after_stats.mean_price,
            before_volatility: cp.before_stats.mean_volatility,
            after_volatility: cp.after_stats.mean_volatility,
        }
    }
}

/// A detected change point matched to a catalogued event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCorrelation {
    pub change_point: ChangePointEstimate,
    pub event: EventRecord,
    pub days_difference: u32,
    /// `1 / (1 + days_difference)`, in `(0, 1]`.
    pub correlation_strength: f64,
}

/// Pipeline stages, in the only order they may complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Idle,
    DataLoaded,
    ModelBuilt,
    Sampled,
    Reduced,
    Correlated,
    Quantified,
    Exported,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Idle => "IDLE",
            Stage::DataLoaded => "DATA_LOADED",
            Stage::ModelBuilt => "MODEL_BUILT",
            Stage::Sampled => "SAMPLED",
            Stage::Reduced => "REDUCED",
            Stage::Correlated => "CORRELATED",
            Stage::Quantified => "QUANTIFIED",
            Stage::Exported => "EXPORTED",
        }
    }

    /// The stage that must exist before this one can run.
    pub fn prerequisite(self) -> Option<Stage> {
        match self {
            Stage::Idle => None,
            Stage::DataLoaded => Some(Stage::Idle),
            Stage::ModelBuilt => Some(Stage::DataLoaded),
            Stage::Sampled => Some(Stage::ModelBuilt),
            Stage::Reduced => Some(Stage::Sampled),
            Stage::Correlated => Some(Stage::Reduced),
            Stage::Quantified => Some(Stage::Correlated),
            Stage::Exported => Some(Stage::Quantified),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn research_labels_map_onto_enums() {
        assert_eq!(EventCategory::from_label("Military Conflict"), EventCategory::Conflict);
        assert_eq!(EventCategory::from_label("OPEC Policy"), EventCategory::Opec);
        assert_eq!(ExpectedDirection::from_label("Price Volatility"), ExpectedDirection::Mixed);
    }

    #[test]
    fn unknown_labels_are_preserved() {
        let c = EventCategory::from_label("Pandemic");
        assert_eq!(c, EventCategory::Other("Pandemic".to_string()));
        assert_eq!(c.label(), "Pandemic");

        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, "\"Pandemic\"");
        let back: EventCategory = serde_json::from_str("\"SANCTIONS\"").unwrap();
        assert_eq!(back, EventCategory::Sanctions);
    }

    #[test]
    fn stages_chain_in_order() {
        let mut stage = Stage::Exported;
        let mut seen = vec![stage];
        while let Some(prev) = stage.prerequisite() {
            assert!(prev < stage);
            stage = prev;
            seen.push(stage);
        }
        assert_eq!(seen.len(), 8);
        assert_eq!(stage, Stage::Idle);
    }
}
