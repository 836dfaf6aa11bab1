//! Error types for the engine, the loaders and the service layer

use thiserror::Error;

/// Input-contract violations raised before any projection work is done
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("unsupported forecast horizon: {0} days (expected 30, 60 or 90)")]
    UnsupportedHorizon(i64),

    #[error("recurring transactions were requested but none were supplied")]
    MissingRecurring,

    #[error("{field} must be a finite number, got {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("{kind} {id} has a non-positive amount: {amount}")]
    NonPositiveAmount {
        kind: &'static str,
        id: String,
        amount: f64,
    },
}

/// Failures while reading ledger data or configuration from disk or a stream
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown transaction type '{0}'")]
    UnknownTransactionType(String),

    #[error("unknown recurrence frequency '{value}' on recurring transaction {id}")]
    UnknownFrequency { id: String, value: String },

    #[error("unknown scenario kind '{0}'")]
    UnknownScenarioKind(String),

    #[error("invalid date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),
}

/// Errors surfaced by [`crate::service::ForecastService`]
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("ledger source failed: {0}")]
    Source(String),

    #[error("persistence sink failed: {0}")]
    Sink(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_messages() {
        let err = EngineError::UnsupportedHorizon(45);
        assert_eq!(
            err.to_string(),
            "unsupported forecast horizon: 45 days (expected 30, 60 or 90)"
        );

        let err = EngineError::NonPositiveAmount {
            kind: "recurring transaction",
            id: "r-1".to_string(),
            amount: -5.0,
        };
        assert!(err.to_string().contains("r-1"));
    }

    #[test]
    fn test_service_error_wraps_engine_error() {
        let err: ServiceError = EngineError::MissingRecurring.into();
        assert!(matches!(err, ServiceError::Engine(EngineError::MissingRecurring)));
    }
}
