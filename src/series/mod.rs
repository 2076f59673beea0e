//! Validated price series and the transforms derived from it.
//!
//! `PriceSeries` is the only way into the pipeline: its constructor enforces strictly
//! increasing dates and positive prices, reporting the first offending record.

pub mod returns;
pub mod window;

use chrono::NaiveDate;

use crate::domain::PricePoint;
use crate::error::DataError;

pub use returns::*;
pub use window::*;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(points: Vec<PricePoint>) -> Result<Self, DataError> {
        for (i, p) in points.iter().enumerate() {
            if !(p.price > 0.0) || !p.price.is_finite() {
                return Err(DataError::NonPositivePrice {
                    date: p.date,
                    price: p.price,
                });
            }
            if i > 0 {
                let previous = points[i - 1].date;
                if p.date == previous {
                    return Err(DataError::DuplicateDate(p.date));
                }
                if p.date < previous {
                    return Err(DataError::OutOfOrder {
                        previous,
                        date: p.date,
                    });
                }
            }
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    /// Restrict to `[start, end]` (either bound optional). Order is preserved so the
    /// result is still valid.
    pub fn between(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> PriceSeries {
        let points = self
            .points
            .iter()
            .filter(|p| start.is_none_or(|s| p.date >= s) && end.is_none_or(|e| p.date <= e))
            .copied()
            .collect();
        PriceSeries { points }
    }
}
