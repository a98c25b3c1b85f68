use thiserror::Error;

/// Failures surfaced by the forecasting core
#[derive(Debug, Clone, Error)]
pub enum ForecastError {
    /// Missing or malformed request data (caller error, never retried)
    #[error("{0}")]
    Validation(String),

    /// The regression engine could not fit or predict
    #[error("Forecasting failed: {0}")]
    Forecasting(String),

    #[error("Insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ForecastError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<super::regression::EngineError> for ForecastError {
    fn from(error: super::regression::EngineError) -> Self {
        ForecastError::Forecasting(error.to_string())
    }
}

impl From<tokio::task::JoinError> for ForecastError {
    fn from(error: tokio::task::JoinError) -> Self {
        ForecastError::Internal(format!("forecast task failed: {error}"))
    }
}
