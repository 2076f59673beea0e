//! Error taxonomy.
//!
//! Library code returns typed errors (`AnalysisError` and its parts) so callers can
//! decide whether to abort a run or exclude one event and continue. The binary
//! collapses everything into `AppError`, which carries a process exit code.

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::Stage;

/// Malformed or insufficient input. Never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("non-positive price {price} on {date}")]
    NonPositivePrice { date: NaiveDate, price: f64 },

    #[error("prices out of order: {date} follows {previous}")]
    OutOfOrder { previous: NaiveDate, date: NaiveDate },

    #[error("duplicate price date {0}")]
    DuplicateDate(NaiveDate),

    #[error("line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("{0}")]
    Io(String),
}

/// Invalid prior or parameter shapes, caught before the sampler runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelSpecError {
    #[error("a change-point model needs at least {required} segments, got {actual}")]
    TooFewSegments { required: usize, actual: usize },

    #[error("a change-point model needs at least 3 returns, got {0}")]
    TooFewObservations(usize),

    #[error("invalid prior for `{parameter}`: {reason}")]
    InvalidPrior { parameter: String, reason: String },

    #[error("event indicator has length {actual}, expected {expected}")]
    IndicatorLength { expected: usize, actual: usize },

    #[error("hierarchical period {period} is empty or out of order")]
    EmptyPeriod { period: usize },

    #[error("parameter vector has length {actual}, expected {expected}")]
    ParameterLength { expected: usize, actual: usize },
}

/// A chain that could not produce draws.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainFailure {
    pub chain: usize,
    pub reason: String,
}

/// Sampling backend failure. Propagated, never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SamplingError {
    #[error("invalid sampler budget: {0}")]
    InvalidBudget(String),

    #[error("{} of {requested} chains failed (first: chain {}: {})",
        .failures.len(),
        .failures.first().map(|f| f.chain).unwrap_or_default(),
        .failures.first().map(|f| f.reason.as_str()).unwrap_or(""))]
    ChainsFailed {
        requested: usize,
        completed: usize,
        failures: Vec<ChainFailure>,
    },
}

/// A pipeline stage was invoked before its prerequisite existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{missing} must be completed before {attempted}")]
pub struct PrecedenceError {
    pub attempted: Stage,
    pub missing: Stage,
}

/// Zero-variance or singular conditions in regression / effect sizes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NumericalError {
    #[error("singular design matrix ({rows} observations, {cols} parameters)")]
    SingularMatrix { rows: usize, cols: usize },

    #[error("zero variance in {0}")]
    ZeroVariance(&'static str),

    #[error("division by zero in {0}")]
    DivisionByZero(&'static str),

    #[error("distribution error: {0}")]
    Distribution(String),
}

/// Any failure surfaced by the analysis library.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    ModelSpecification(#[from] ModelSpecError),

    #[error(transparent)]
    Sampling(#[from] SamplingError),

    #[error(transparent)]
    Precedence(#[from] PrecedenceError),

    #[error(transparent)]
    Numerical(#[from] NumericalError),

    #[error("export failed: {0}")]
    Export(String),
}

impl AnalysisError {
    /// Process exit code used by the `breaks` binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            AnalysisError::Data(DataError::InsufficientData { .. }) => 3,
            AnalysisError::Data(_) | AnalysisError::Export(_) => 2,
            AnalysisError::ModelSpecification(_) | AnalysisError::Numerical(_) => 4,
            AnalysisError::Sampling(_) => 5,
            AnalysisError::Precedence(_) => 6,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl From<DataError> for AppError {
    fn from(err: DataError) -> Self {
        AnalysisError::from(err).into()
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
