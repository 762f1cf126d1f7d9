use analysis_core::{CallOutcome, TransientKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AiError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Service rejected request: {0}")]
    Rejected(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

pub type AiResult<T> = Result<T, AiError>;

impl AiError {
    /// Classify this error for the retry executor and circuit breaker.
    ///
    /// Timeouts and connection failures are retryable; 4xx rejections are
    /// permanent and must not count against the breaker.
    pub fn into_outcome<T>(self) -> CallOutcome<T> {
        match self {
            AiError::RequestFailed(e) if e.is_timeout() => {
                CallOutcome::transient(TransientKind::Timeout, e.to_string())
            }
            AiError::RequestFailed(e) => {
                CallOutcome::transient(TransientKind::Transport, e.to_string())
            }
            AiError::Rejected(message) => CallOutcome::permanent(message),
            AiError::ServiceUnavailable(message) => {
                CallOutcome::transient(TransientKind::ServerError, message)
            }
            AiError::InvalidResponse(message) => {
                CallOutcome::transient(TransientKind::ServerError, message)
            }
        }
    }
}
