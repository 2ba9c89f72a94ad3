/// error.rs — Pipeline error kinds
///
/// Every stage either returns a fully valid augmented table or fails with one
/// of these.  Nothing downstream substitutes a default volatility or regime
/// when a fit fails.
use chrono::NaiveDate;
use thiserror::Error;

/// Which statistical estimator failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitStage {
    Garch,
    Hmm,
}

impl std::fmt::Display for FitStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FitStage::Garch => write!(f, "GARCH(1,1)"),
            FitStage::Hmm => write!(f, "Gaussian HMM"),
        }
    }
}

/// Malformed or insufficient price history.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("price table is empty")]
    Empty,

    #[error("required column `{0}` is missing")]
    MissingColumn(String),

    #[error("{column} is undefined on {date}")]
    MissingValue { column: &'static str, date: NaiveDate },

    #[error("close on {date} must be finite and positive, got {close}")]
    InvalidClose { date: NaiveDate, close: f64 },

    #[error("dates must be strictly increasing: {date} follows {prev}")]
    NonMonotonicDates { prev: NaiveDate, date: NaiveDate },

    #[error("unparseable date `{0}`")]
    BadDate(String),

    #[error("insufficient history: need at least {required} rows, got {actual}")]
    InsufficientHistory { required: usize, actual: usize },

    #[error("invalid pipeline parameter: {0}")]
    InvalidParameter(String),
}

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("input error: {0}")]
    Input(#[from] InputError),

    #[error("{stage} fit failed: {reason}")]
    ModelFit { stage: FitStage, reason: String },

    #[error("failed to read price data: {0}")]
    Io(#[from] polars::error::PolarsError),
}

impl RiskError {
    pub fn fit(stage: FitStage, reason: impl Into<String>) -> Self {
        RiskError::ModelFit { stage, reason: reason.into() }
    }

    /// The failing estimator, if this is a fit failure.
    pub fn fit_stage(&self) -> Option<FitStage> {
        match self {
            RiskError::ModelFit { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RiskError>;
