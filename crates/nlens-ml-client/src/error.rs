//! Detection client error types.

use thiserror::Error;

pub type MlResult<T> = Result<T, MlError>;

#[derive(Debug, Error)]
pub enum MlError {
    #[error("Detection service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Response has no outputs")]
    MissingOutputs,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MlError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MlError::ServiceUnavailable(_) | MlError::Timeout(_) | MlError::Network(_)
        )
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_http_status(status: u16, body: &str) -> Self {
        match status {
            502..=504 => MlError::ServiceUnavailable(format!("{}: {}", status, body)),
            _ => MlError::RequestFailed(format!(
                "Detection service returned {}: {}",
                status, body
            )),
        }
    }
}
