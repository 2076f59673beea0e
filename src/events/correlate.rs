//! Matching detected change points to catalogued events.

use crate::domain::{ChangePointEstimate, EventCorrelation, EventRecord};

/// Absolute distance in days. Symmetric in its arguments.
pub fn days_between(a: chrono::NaiveDate, b: chrono::NaiveDate) -> u32 {
    (a - b).num_days().unsigned_abs().min(u32::MAX as u64) as u32
}

pub fn correlation_strength(days: u32) -> f64 {
    1.0 / (1.0 + days as f64)
}

/// Every (change point, event) pair within `tolerance_days`, strongest first.
///
/// Ties in strength are broken by ascending event date, then by change-point date.
pub fn correlate(
    change_points: &[ChangePointEstimate],
    events: &[EventRecord],
    tolerance_days: u32,
) -> Vec<EventCorrelation> {
    let mut out = Vec::new();
    for cp in change_points {
        for event in events {
            let days = days_between(cp.date, event.date);
            if days <= tolerance_days {
                out.push(EventCorrelation {
                    change_point: cp.clone(),
                    event: event.clone(),
                    days_difference: days,
                    correlation_strength: correlation_strength(days),
                });
            }
        }
    }
    out.sort_by(|a, b| {
        b.correlation_strength
            .total_cmp(&a.correlation_strength)
            .then(a.event.date.cmp(&b.event.date))
            .then(a.change_point.date.cmp(&b.change_point.date))
    });
    out
}
