//! LLM-related error types.

use thiserror::Error;

/// Errors that can occur with provider operations.
#[derive(Debug, Error)]
pub enum LlmError {
    /// API key not configured.
    #[error("API key not configured for {provider}")]
    ApiKeyNotConfigured {
        /// Provider name.
        provider: String,
    },

    /// API request failed.
    #[error("API request failed: {0}")]
    ApiRequestFailed(String),

    /// Invalid response from API.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// HTTP error.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The circuit is open; the provider was not invoked.
    #[error("circuit open, retry in {retry_after_secs}s")]
    CircuitOpen {
        /// Seconds until the breaker will probe again.
        retry_after_secs: u64,
    },
}

/// Result type for provider operations.
pub type LlmResult<T> = Result<T, LlmError>;
