//! Error types for embedding operations

use thiserror::Error;
use tutorgraph_core::GraphError;

/// Embedding operation errors
#[derive(Error, Debug, Clone)]
pub enum EmbeddingError {
    /// Rejected before any network call
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Text exceeds the embedding input cap; rejected without a call
    #[error("Text too long: {length} characters exceeds maximum of {max}")]
    TextTooLong { length: usize, max: usize },

    /// Bad provider configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// API key missing, invalid, or rejected
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// Provider-side rate limiting (HTTP 429)
    #[error("Provider rate limited: {0}")]
    RateLimited(String),

    /// Network or server failure
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Response did not match the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Monthly token budget exhausted; fails fast until the month rolls
    #[error("Monthly token quota exceeded: used {used} of {quota}")]
    QuotaExceeded { used: u64, quota: u64 },
}

/// Result type for embedding operations
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

impl EmbeddingError {
    /// Whether a retry can plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EmbeddingError::HttpError(_)
                | EmbeddingError::RateLimited(_)
                | EmbeddingError::InvalidResponse(_)
        )
    }
}

impl From<EmbeddingError> for GraphError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::InvalidInput(msg) => GraphError::Validation(msg),
            EmbeddingError::TextTooLong { length, max } => GraphError::Validation(format!(
                "text too long: {length} characters exceeds maximum of {max}"
            )),
            EmbeddingError::ConfigError(msg) => GraphError::Provider(msg),
            EmbeddingError::AuthError(msg) => GraphError::ProviderAuth(msg),
            EmbeddingError::RateLimited(msg) => GraphError::Provider(format!("rate limited: {msg}")),
            EmbeddingError::HttpError(msg) => GraphError::Provider(msg),
            EmbeddingError::InvalidResponse(msg) => GraphError::Provider(msg),
            EmbeddingError::QuotaExceeded { used, quota } => {
                GraphError::QuotaExceeded { used, quota }
            }
        }
    }
}
