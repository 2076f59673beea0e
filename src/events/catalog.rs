//! Catalog of geopolitical and economic events.
//!
//! The catalog is immutable reference data: filters return new catalogs and
//! [`EventCatalog::with_event`] consumes the old one. Events are kept sorted by date
//! (stable, so same-day events keep insertion order).

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{EventCategory, EventRecord, ExpectedDirection};

/// (year, month, day, name, category, expected impact, region, description)
type BuiltinRow = (i32, u32, u32, &'static str, &'static str, &'static str, &'static str, &'static str);

const BUILTIN: &[BuiltinRow] = &[
    (1990, 8, 2, "Iraq invades Kuwait", "Military Conflict", "Price Increase", "Middle East",
        "Iraq invades Kuwait, leading to the Gulf War and significant oil supply disruptions"),
    (1991, 1, 17, "Operation Desert Storm begins", "Military Conflict", "Price Volatility", "Middle East",
        "US-led coalition begins military operations against Iraq"),
    (1997, 7, 2, "Asian Financial Crisis begins", "Economic Crisis", "Price Decrease", "Asia",
        "Financial crisis in Asia leads to reduced oil demand"),
    (1998, 3, 30, "OPEC production cuts", "OPEC Policy", "Price Increase", "Global",
        "OPEC agrees to cut production by 2.5 million barrels per day"),
    (2001, 9, 11, "9/11 Terrorist Attacks", "Terrorism", "Price Increase", "North America",
        "Terrorist attacks on US soil create market uncertainty"),
    (2003, 3, 20, "US invasion of Iraq begins", "Military Conflict", "Price Increase", "Middle East",
        "US-led invasion of Iraq creates supply uncertainty"),
    (2008, 9, 15, "Lehman Brothers bankruptcy", "Economic Crisis", "Price Decrease", "Global",
        "Global financial crisis leads to economic recession and reduced oil demand"),
    (2011, 1, 25, "Arab Spring begins", "Political Unrest", "Price Increase", "Middle East/North Africa",
        "Political unrest in Middle East and North Africa affects oil production"),
    (2011, 2, 17, "Libyan Civil War begins", "Military Conflict", "Price Increase", "North Africa",
        "Civil war in Libya disrupts oil production"),
    (2012, 1, 1, "US Shale Revolution accelerates", "Technology", "Price Decrease", "North America",
        "Increased US shale oil production changes global supply dynamics"),
    (2014, 11, 27, "OPEC maintains production despite oversupply", "OPEC Policy", "Price Decrease", "Global",
        "OPEC refuses to cut production despite falling prices"),
    (2020, 3, 11, "COVID-19 declared pandemic", "Pandemic", "Price Decrease", "Global",
        "Global pandemic leads to unprecedented demand destruction"),
    (2022, 2, 24, "Russia invades Ukraine", "Military Conflict", "Price Increase", "Europe",
        "Russian invasion of Ukraine creates energy supply uncertainty"),
    (2022, 10, 5, "OPEC+ announces major production cuts", "OPEC Policy", "Price Increase", "Global",
        "OPEC+ agrees to cut production by 2 million barrels per day"),
];

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventCatalog {
    events: Vec<EventRecord>,
}

/// Counts over the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogStats {
    pub total_events: usize,
    pub categories: BTreeMap<String, usize>,
    pub regions: BTreeMap<String, usize>,
    pub expected_directions: BTreeMap<String, usize>,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

impl EventCatalog {
    pub fn new(mut events: Vec<EventRecord>) -> Self {
        events.sort_by_key(|e| e.date);
        Self { events }
    }

    /// The Brent-relevant events from 1990 to 2022.
    pub fn builtin() -> Self {
        let events = BUILTIN
            .iter()
            .filter_map(|&(y, m, d, name, category, impact, region, description)| {
                Some(EventRecord {
                    date: NaiveDate::from_ymd_opt(y, m, d)?,
                    name: name.to_string(),
                    category: EventCategory::from_label(category),
                    region: region.to_string(),
                    expected_direction: ExpectedDirection::from_label(impact),
                    description: description.to_string(),
                })
            })
            .collect();
        Self::new(events)
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn filtered(&self, keep: impl Fn(&EventRecord) -> bool) -> Self {
        Self {
            events: self.events.iter().filter(|e| keep(e)).cloned().collect(),
        }
    }

    /// Events with `start <= date <= end`.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> Self {
        self.filtered(|e| e.date >= start && e.date <= end)
    }

    pub fn by_category(&self, category: &EventCategory) -> Self {
        self.filtered(|e| &e.category == category)
    }

    pub fn by_region(&self, region: &str) -> Self {
        self.filtered(|e| e.region.eq_ignore_ascii_case(region))
    }

    pub fn with_event(mut self, event: EventRecord) -> Self {
        let at = self.events.partition_point(|e| e.date <= event.date);
        self.events.insert(at, event);
        self
    }

    pub fn statistics(&self) -> CatalogStats {
        let mut categories = BTreeMap::new();
        let mut regions = BTreeMap::new();
        let mut expected_directions = BTreeMap::new();
        for e in &self.events {
            *categories.entry(e.category.label().to_string()).or_insert(0) += 1;
            *regions.entry(e.region.clone()).or_insert(0) += 1;
            *expected_directions
                .entry(e.expected_direction.label().to_string())
                .or_insert(0) += 1;
        }
        let date_range = match (self.events.first(), self.events.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date)),
            _ => None,
        };
        CatalogStats {
            total_events: self.events.len(),
            categories,
            regions,
            expected_directions,
            date_range,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn builtin_catalog_is_sorted_and_complete() {
        let c = EventCatalog::builtin();
        assert_eq!(c.len(), 14);
        assert!(c.events().windows(2).all(|w| w[0].date <= w[1].date));
        assert_eq!(c.events()[0].category, EventCategory::Conflict);
        assert_eq!(c.events()[4].category, EventCategory::Other("Terrorism".into()));
    }

    #[test]
    fn filters() {
        let c = EventCatalog::builtin();
        assert_eq!(c.between(ymd(2011, 1, 1), ymd(2011, 12, 31)).len(), 2);
        assert_eq!(c.by_category(&EventCategory::Opec).len(), 3);
        assert_eq!(c.by_region("global").len(), 5);
    }

    #[test]
    fn statistics_count_groups() {
        let stats = EventCatalog::builtin().statistics();
        assert_eq!(stats.total_events, 14);
        assert_eq!(stats.categories.get("CONFLICT"), Some(&5));
        assert_eq!(stats.expected_directions.get("POSITIVE"), Some(&8));
        assert_eq!(stats.date_range, Some((ymd(1990, 8, 2), ymd(2022, 10, 5))));
    }

    #[test]
    fn added_event_lands_in_date_order() {
        let event = EventRecord {
            date: ymd(2016, 11, 30),
            name: "OPEC Vienna agreement".into(),
            category: EventCategory::Opec,
            region: "Global".into(),
            expected_direction: ExpectedDirection::Positive,
            description: String::new(),
        };
        let c = EventCatalog::builtin().with_event(event.clone());
        assert_eq!(c.len(), 15);
        let pos = c.events().iter().position(|e| e == &event).unwrap();
        assert!(c.events()[pos - 1].date < event.date && c.events()[pos + 1].date > event.date);
        assert!(EventCatalog::default().statistics().date_range.is_none());
    }
}
