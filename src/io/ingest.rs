//! CSV ingest for price series and event catalogs.
//!
//! Row-level problems (unparseable dates, non-numeric or non-positive prices,
//! duplicate dates) never abort a load: the row is skipped and reported in
//! `row_errors`. Only an unreadable file, a missing column or an empty result fails.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;
use log::{debug, warn};

use crate::domain::{EventCategory, EventRecord, ExpectedDirection, PricePoint};
use crate::error::DataError;
use crate::events::EventCatalog;
use crate::series::PriceSeries;

/// Accepted date layouts, tried in order.
const DATE_FORMATS: [&str; 3] = ["%d-%b-%y", "%b %d, %Y", "%Y-%m-%d"];

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct LoadedPrices {
    pub series: PriceSeries,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

#[derive(Debug, Clone)]
pub struct LoadedEvents {
    pub catalog: EventCatalog,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Parse a date in any of the accepted layouts. Surrounding quotes and whitespace
/// are ignored.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim().trim_matches('"').trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

fn parse_price(raw: &str) -> Result<f64, String> {
    let s = raw.trim().trim_matches('"').replace(',', "");
    let price: f64 = s.trim().parse().map_err(|_| format!("invalid price '{raw}'"))?;
    if !(price > 0.0) || !price.is_finite() {
        return Err(format!("non-positive price {price}"));
    }
    Ok(price)
}

fn normalize_header_name(name: &str) -> String {
    name.trim()
        .trim_start_matches('\u{feff}')
        .trim_matches('"')
        .trim()
        .to_ascii_lowercase()
        .replace([' ', '-'], "_")
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn column(map: &HashMap<String, usize>, aliases: &[&str]) -> Option<usize> {
    aliases.iter().find_map(|a| map.get(*a).copied())
}

fn required_column(map: &HashMap<String, usize>, aliases: &[&str]) -> Result<usize, DataError> {
    column(map, aliases).ok_or_else(|| DataError::Malformed {
        line: 1,
        message: format!("missing required column '{}'", aliases[0]),
    })
}

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input)
}

fn open(path: &Path) -> Result<File, DataError> {
    File::open(path).map_err(|e| DataError::Io(format!("failed to open '{}': {e}", path.display())))
}

pub fn load_prices(path: &Path) -> Result<LoadedPrices, DataError> {
    let loaded = read_prices(open(path)?)?;
    debug!(
        "loaded {} prices from {} ({} rows skipped)",
        loaded.series.len(),
        path.display(),
        loaded.row_errors.len()
    );
    Ok(loaded)
}

/// Read a `Date,Price` table. Rows are sorted by date; for a repeated date the
/// first occurrence wins.
pub fn read_prices<R: Read>(input: R) -> Result<LoadedPrices, DataError> {
    let mut reader = reader(input);
    let headers = reader
        .headers()
        .map_err(|e| DataError::Malformed {
            line: 1,
            message: format!("failed to read CSV headers: {e}"),
        })?
        .clone();
    let map = build_header_map(&headers);
    let date_col = required_column(&map, &["date"])?;
    let price_col = required_column(&map, &["price", "close", "value"])?;

    let mut rows: Vec<(usize, PricePoint)> = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        rows_read += 1;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };
        let raw_date = record.get(date_col).unwrap_or("");
        let Some(date) = parse_date(raw_date) else {
            row_errors.push(RowError {
                line,
                message: format!("unparseable date '{raw_date}'"),
            });
            continue;
        };
        match parse_price(record.get(price_col).unwrap_or("")) {
            Ok(price) => rows.push((line, PricePoint { date, price })),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    rows.sort_by_key(|(_, p)| p.date);
    let mut points: Vec<PricePoint> = Vec::with_capacity(rows.len());
    for (line, point) in rows {
        if points.last().is_some_and(|last| last.date == point.date) {
            row_errors.push(RowError {
                line,
                message: format!("duplicate date {}", point.date),
            });
            continue;
        }
        points.push(point);
    }
    row_errors.sort_by_key(|e| e.line);

    if points.is_empty() {
        return Err(DataError::InsufficientData {
            required: 1,
            actual: 0,
        });
    }
    if !row_errors.is_empty() {
        warn!("skipped {} malformed price rows", row_errors.len());
    }

    Ok(LoadedPrices {
        series: PriceSeries::new(points)?,
        row_errors,
        rows_read,
    })
}

pub fn load_events(path: &Path) -> Result<LoadedEvents, DataError> {
    read_events(open(path)?)
}

/// Read an event catalog: `date,event|name,category,region,expected_impact|expected_direction,description`.
///
/// Unknown categories and directions are kept verbatim.
pub fn read_events<R: Read>(input: R) -> Result<LoadedEvents, DataError> {
    let mut reader = reader(input);
    let headers = reader
        .headers()
        .map_err(|e| DataError::Malformed {
            line: 1,
            message: format!("failed to read CSV headers: {e}"),
        })?
        .clone();
    let map = build_header_map(&headers);
    let date_col = required_column(&map, &["date"])?;
    let name_col = required_column(&map, &["event", "name"])?;
    let category_col = column(&map, &["category"]);
    let region_col = column(&map, &["region"]);
    let direction_col = column(&map, &["expected_impact", "expected_direction", "direction"]);
    let description_col = column(&map, &["description"]);

    let mut events = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        rows_read += 1;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };
        let field = |col: Option<usize>| col.and_then(|c| record.get(c)).unwrap_or("").trim().to_string();
        let raw_date = field(Some(date_col));
        let Some(date) = parse_date(&raw_date) else {
            row_errors.push(RowError {
                line,
                message: format!("unparseable date '{raw_date}'"),
            });
            continue;
        };
        let name = field(Some(name_col));
        if name.is_empty() {
            row_errors.push(RowError {
                line,
                message: "missing event name".to_string(),
            });
            continue;
        }
        events.push(EventRecord {
            date,
            name,
            category: EventCategory::from_label(&field(category_col)),
            region: field(region_col),
            expected_direction: ExpectedDirection::from_label(&field(direction_col)),
            description: field(description_col),
        });
    }

    Ok(LoadedEvents {
        catalog: EventCatalog::new(events),
        row_errors,
        rows_read,
    })
}
