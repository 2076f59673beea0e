//! Log-return transform.

use crate::domain::ReturnPoint;
use crate::error::DataError;
use crate::series::PriceSeries;

/// `ln(p[t] / p[t-1])` for every consecutive pair, dated with the later price.
///
/// Needs at least two prices. Pure: the same series always yields the same output.
pub fn log_returns(series: &PriceSeries) -> Result<Vec<ReturnPoint>, DataError> {
    if series.len() < 2 {
        return Err(DataError::InsufficientData {
            required: 2,
            actual: series.len(),
        });
    }
    Ok(series
        .points()
        .windows(2)
        .map(|w| ReturnPoint {
            date: w[1].date,
            log_return: (w[1].price / w[0].price).ln(),
        })
        .collect())
}

pub fn return_values(returns: &[ReturnPoint]) -> Vec<f64> {
    returns.iter().map(|r| r.log_return).collect()
}

/// Prices aligned with the return sequence: entry `i` is the price on return `i`'s date.
pub fn aligned_prices(series: &PriceSeries) -> Vec<f64> {
    series.points().iter().skip(1).map(|p| p.price).collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::domain::PricePoint;

    fn series(prices: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2021, 3, 1).unwrap();
        PriceSeries::new(
            prices
                .iter()
                .enumerate()
                .map(|(i, &price)| PricePoint {
                    date: start + chrono::Days::new(i as u64),
                    price,
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn one_price_is_insufficient() {
        let err = log_returns(&series(&[50.0])).unwrap_err();
        assert_eq!(err, DataError::InsufficientData { required: 2, actual: 1 });
    }

    #[test]
    fn returns_are_dated_with_later_price() {
        let s = series(&[100.0, 110.0, 99.0]);
        let r = log_returns(&s).unwrap();
        assert_eq!(r.len(), 2);
        assert_eq!(r[0].date, s.points()[1].date);
        assert!((r[0].log_return - (1.1f64).ln()).abs() < 1e-15);
        assert_eq!(aligned_prices(&s), vec![110.0, 99.0]);
    }

    #[test]
    fn transform_is_idempotent() {
        let s = series(&[71.2, 70.9, 73.4, 73.4, 69.0]);
        assert_eq!(log_returns(&s).unwrap(), log_returns(&s).unwrap());
    }
}
