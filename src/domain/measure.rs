//! A statistic that is either defined or explicitly undefined.
//!
//! Windows can be truncated to nothing, variances can be zero and design matrices can
//! be singular. Rather than letting NaN flow into exported results, every such value
//! is a `Measure` that records *why* it is undefined.
//!
//! On the wire a finite value is a number and everything else is a label:
//! `"inf"`/`"-inf"` for infinite statistics (a t statistic over zero variance) and the
//! reason (`"insufficient_data"`, ...) for undefined ones. JSON has no infinity, so
//! without the label `serde_json` would write `null`.

use serde::{Deserialize, Serialize};

/// Why a statistic could not be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Undefined {
    InsufficientData,
    ZeroVariance,
    DivisionByZero,
    SingularMatrix,
    AllZeroDifferences,
}

impl Undefined {
    pub fn label(self) -> &'static str {
        match self {
            Undefined::InsufficientData => "insufficient_data",
            Undefined::ZeroVariance => "zero_variance",
            Undefined::DivisionByZero => "division_by_zero",
            Undefined::SingularMatrix => "singular_matrix",
            Undefined::AllZeroDifferences => "all_zero_differences",
        }
    }
}

impl Undefined {
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "insufficient_data" => Some(Undefined::InsufficientData),
            "zero_variance" => Some(Undefined::ZeroVariance),
            "division_by_zero" => Some(Undefined::DivisionByZero),
            "singular_matrix" => Some(Undefined::SingularMatrix),
            "all_zero_differences" => Some(Undefined::AllZeroDifferences),
            _ => None,
        }
    }
}

impl std::fmt::Display for Undefined {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A statistic that is either a number or a named reason it could not be computed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "MeasureRepr", try_from = "MeasureRepr")]
pub enum Measure {
    Defined(f64),
    Undefined(Undefined),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum MeasureRepr {
    Number(f64),
    Label(String),
}

impl From<Measure> for MeasureRepr {
    fn from(m: Measure) -> Self {
        match m {
            Measure::Defined(v) if v.is_finite() => MeasureRepr::Number(v),
            Measure::Defined(v) if v == f64::INFINITY => MeasureRepr::Label("inf".into()),
            Measure::Defined(v) if v == f64::NEG_INFINITY => MeasureRepr::Label("-inf".into()),
            Measure::Defined(_) => MeasureRepr::Label("nan".into()),
            Measure::Undefined(r) => MeasureRepr::Label(r.label().into()),
        }
    }
}

impl TryFrom<MeasureRepr> for Measure {
    type Error = String;

    fn try_from(repr: MeasureRepr) -> Result<Self, Self::Error> {
        match repr {
            MeasureRepr::Number(v) => Ok(Measure::Defined(v)),
            MeasureRepr::Label(label) => match label.as_str() {
                "inf" | "+inf" => Ok(Measure::Defined(f64::INFINITY)),
                "-inf" => Ok(Measure::Defined(f64::NEG_INFINITY)),
                other => Undefined::from_label(other)
                    .map(Measure::Undefined)
                    .ok_or_else(|| format!("unknown measure label '{other}'")),
            },
        }
    }
}

impl Measure {
    pub fn value(self) -> Option<f64> {
        match self {
            Measure::Defined(v) => Some(v),
            Measure::Undefined(_) => None,
        }
    }

    pub fn is_defined(self) -> bool {
        matches!(self, Measure::Defined(_))
    }

    pub fn reason(self) -> Option<Undefined> {
        match self {
            Measure::Defined(_) => None,
            Measure::Undefined(r) => Some(r),
        }
    }

    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Self {
        match self {
            Measure::Defined(v) => Measure::Defined(f(v)),
            other => other,
        }
    }

    /// Combine two measures; the first undefined operand wins.
    pub fn zip_with(self, other: Measure, f: impl FnOnce(f64, f64) -> Measure) -> Measure {
        match (self, other) {
            (Measure::Defined(a), Measure::Defined(b)) => f(a, b),
            (Measure::Undefined(r), _) | (_, Measure::Undefined(r)) => Measure::Undefined(r),
        }
    }

    /// `after - before`.
    pub fn change(before: Measure, after: Measure) -> Measure {
        before.zip_with(after, |b, a| Measure::Defined(a - b))
    }

    /// `(after - before) / before * 100`, undefined when `before == 0`.
    pub fn pct_change(before: Measure, after: Measure) -> Measure {
        before.zip_with(after, |b, a| {
            if b == 0.0 {
                Measure::Undefined(Undefined::DivisionByZero)
            } else {
                Measure::Defined((a - b) / b * 100.0)
            }
        })
    }
}

impl std::fmt::Display for Measure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Measure::Defined(v) => match f.precision() {
                Some(p) => write!(f, "{v:.p$}"),
                None => write!(f, "{v}"),
            },
            Measure::Undefined(r) => write!(f, "n/a ({r})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pct_change_flags_zero_base() {
        let m = Measure::pct_change(Measure::Defined(0.0), Measure::Defined(5.0));
        assert_eq!(m, Measure::Undefined(Undefined::DivisionByZero));

        let m = Measure::pct_change(Measure::Defined(100.0), Measure::Defined(120.0));
        assert!((m.value().unwrap() - 20.0).abs() < 1e-12);
    }

    #[test]
    fn undefined_operand_propagates() {
        let m = Measure::change(Measure::Undefined(Undefined::InsufficientData), Measure::Defined(1.0));
        assert_eq!(m.reason(), Some(Undefined::InsufficientData));
    }

    #[test]
    fn serializes_untagged() {
        let json = serde_json::to_string(&vec![
            Measure::Defined(1.5),
            Measure::Undefined(Undefined::InsufficientData),
        ])
        .unwrap();
        assert_eq!(json, r#"[1.5,"insufficient_data"]"#);
    }

    #[test]
    fn infinities_serialize_as_labels() {
        let values = vec![
            Measure::Defined(f64::INFINITY),
            Measure::Defined(f64::NEG_INFINITY),
            Measure::Undefined(Undefined::SingularMatrix),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"["inf","-inf","singular_matrix"]"#);
        let back: Vec<Measure> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
        assert!(serde_json::from_str::<Measure>(r#""bogus""#).is_err());
    }
}
