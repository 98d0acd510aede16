//! Error types for portfolio analysis runs

use crate::run::{RunToken, Stale};
use thiserror::Error;

/// Input rejected before anything is sent to the service
///
/// Always recoverable by editing the input; the messages are user facing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No ticker symbols after parsing
    #[error("Enter at least one ticker symbol.")]
    NoTickers,

    /// Start or end date left blank
    #[error("Enter both a start date and an end date.")]
    MissingDates,

    /// Start date on or after the end date
    #[error("Start date ({start}) must be earlier than end date ({end}).")]
    StartNotBeforeEnd { start: String, end: String },

    /// Weight vector does not line up with the tickers
    #[error("Expected {expected} weights, got {actual}.")]
    WeightCountMismatch { expected: usize, actual: usize },

    /// Weight edit addressed a ticker that has no allocation row
    #[error("No allocation row for ticker {0}.")]
    UnknownTicker(String),
}

/// Failure reported for an analysis request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// Tickers have histories starting on different days
    ///
    /// Carries the latest common start date; the caller is expected to apply it
    /// and offer resubmission rather than retry on its own.
    #[error("Stock data has different start dates. The latest start date is {suggested_start_date}.")]
    DateRangeMismatch { suggested_start_date: String },

    /// Opaque service-side or transport failure, surfaced verbatim
    #[error("{0}")]
    ServiceError(String),
}

impl AnalysisError {
    /// Suggested corrected start date, if the service offered one
    pub fn suggested_start_date(&self) -> Option<&str> {
        match self {
            Self::DateRangeMismatch {
                suggested_start_date,
            } => Some(suggested_start_date),
            Self::ServiceError(_) => None,
        }
    }
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        AnalysisError::ServiceError(err.to_string())
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Configuration error: {0}")]
pub struct ConfigError(pub String);

/// Top-level error for a client run
#[derive(Debug, Error)]
pub enum ClientError {
    /// Local validation failed; no request was sent
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The service rejected or failed the request
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// A newer run started before this one finished; its result was discarded
    #[error("Run {token} was superseded by run {latest}")]
    Superseded { token: RunToken, latest: RunToken },

    /// Invalid client configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<Stale> for ClientError {
    fn from(stale: Stale) -> Self {
        ClientError::Superseded {
            token: stale.token,
            latest: stale.latest,
        }
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
