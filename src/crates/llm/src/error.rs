//! Error types for LLM provider implementations.

use thiserror::Error;

/// Result type for LLM operations.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors that can occur when working with LLM providers.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API authentication failed.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// API key not found in the environment.
    #[error("API key not found: {0}")]
    ApiKeyNotFound(String),

    /// Provider service unavailable (5xx).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Invalid request parameters (4xx other than auth/rate).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Response did not match the expected wire format.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Request deadline exceeded.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl LlmError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Http(err) => err.is_timeout() || err.is_connect(),
            LlmError::ServiceUnavailable(_)
            | LlmError::Timeout(_)
            | LlmError::RateLimitExceeded(_) => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::InvalidResponse(err.to_string())
    }
}

/// Providers surface errors to the engine as agent errors, preserving the
/// retryable classification.
impl From<LlmError> for steward_core::EngineError {
    fn from(err: LlmError) -> Self {
        let retryable = err.is_retryable();
        steward_core::EngineError::Agent {
            message: err.to_string(),
            retryable,
        }
    }
}
