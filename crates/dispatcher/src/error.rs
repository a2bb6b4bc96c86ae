use crate::pool::PoolError;
use api_client::error::ApiError;
use core_types::CoreError;
use serde::Serialize;
use std::fmt;
use strategies::StrategyError;
use thiserror::Error;

/// The small set of outward failure classes every error is reduced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    BadRequest,
    NotFound,
    NotImplemented,
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::BadRequest => "bad_request",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::NotImplemented => "not_implemented",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Unknown strategy '{0}'")]
    UnknownStrategy(String),

    #[error("No historical data found for {0}")]
    TickerNotFound(String),

    #[error("Insufficient historical data (need {required}+ days, got {actual})")]
    InsufficientData { required: usize, actual: usize },

    #[error("{0}")]
    DependencyUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Strategy execution failed: {0}")]
    StrategyExecution(String),

    #[error("Model produced no predictions")]
    EmptyForecast,

    #[error("Market data error: {0}")]
    MarketData(#[from] ApiError),

    #[error("Worker pool error: {0}")]
    Worker(#[from] PoolError),
}

impl DispatchError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            DispatchError::UnknownStrategy(_)
            | DispatchError::InsufficientData { .. }
            | DispatchError::InvalidInput(_) => ErrorCategory::BadRequest,
            DispatchError::TickerNotFound(_) => ErrorCategory::NotFound,
            DispatchError::DependencyUnavailable(_) => ErrorCategory::NotImplemented,
            DispatchError::StrategyExecution(_)
            | DispatchError::EmptyForecast
            | DispatchError::MarketData(_)
            | DispatchError::Worker(_) => ErrorCategory::Internal,
        }
    }
}

impl From<CoreError> for DispatchError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::UnknownStrategy(name) => DispatchError::UnknownStrategy(name),
            CoreError::InsufficientData { required, actual } => {
                DispatchError::InsufficientData { required, actual }
            }
            other => DispatchError::InvalidInput(other.to_string()),
        }
    }
}

impl From<StrategyError> for DispatchError {
    fn from(e: StrategyError) -> Self {
        match e {
            StrategyError::InvalidInput(msg) => DispatchError::InvalidInput(msg),
            StrategyError::Execution(msg) => DispatchError::StrategyExecution(msg),
            StrategyError::DependencyUnavailable(msg) => DispatchError::DependencyUnavailable(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(DispatchError::UnknownStrategy("foo".into()), ErrorCategory::BadRequest)]
    #[case(DispatchError::InsufficientData { required: 60, actual: 10 }, ErrorCategory::BadRequest)]
    #[case(DispatchError::InvalidInput("days".into()), ErrorCategory::BadRequest)]
    #[case(DispatchError::TickerNotFound("X".into()), ErrorCategory::NotFound)]
    #[case(DispatchError::DependencyUnavailable("lstm".into()), ErrorCategory::NotImplemented)]
    #[case(DispatchError::StrategyExecution("boom".into()), ErrorCategory::Internal)]
    #[case(DispatchError::EmptyForecast, ErrorCategory::Internal)]
    #[case(DispatchError::Worker(PoolError::Cancelled), ErrorCategory::Internal)]
    fn errors_map_to_outward_categories(#[case] error: DispatchError, #[case] expected: ErrorCategory) {
        assert_eq!(error.category(), expected);
    }

    #[test]
    fn strategy_errors_are_reclassified() {
        let err: DispatchError = StrategyError::InvalidInput("bad".into()).into();
        assert_eq!(err.category(), ErrorCategory::BadRequest);
        let err: DispatchError = StrategyError::Execution("nan".into()).into();
        assert!(matches!(err, DispatchError::StrategyExecution(ref m) if m == "nan"));
    }

    #[test]
    fn insufficient_data_message_names_both_counts() {
        let err: DispatchError = CoreError::InsufficientData { required: 60, actual: 12 }.into();
        assert_eq!(err.to_string(), "Insufficient historical data (need 60+ days, got 12)");
    }
}
