//! Error taxonomy for graph operations
//!
//! One error type covers the whole subsystem so that the recovery
//! classifier (`crate::recovery`) can map any failure to a directive
//! without downcasting. Backend crates define their own error types and
//! convert into `GraphError` at the boundary.

use std::time::Duration;
use thiserror::Error;

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Graph operation errors
#[derive(Error, Debug)]
pub enum GraphError {
    /// Malformed input, rejected before any I/O
    #[error("Validation error: {0}")]
    Validation(String),

    /// Sliding-window request limit exceeded
    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited {
        /// Time until the window has room again
        retry_after: Duration,
    },

    /// Transient embedding provider failure (network, 5xx, provider 429)
    #[error("Embedding provider error: {0}")]
    Provider(String),

    /// Invalid or rejected API key
    #[error("Embedding provider authentication failed: {0}")]
    ProviderAuth(String),

    /// Monthly embedding token budget exhausted
    #[error("Monthly token quota exceeded: used {used} of {quota}")]
    QuotaExceeded { used: u64, quota: u64 },

    /// Storage backend failure (constraint violation, query error)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Storage backend unreachable
    #[error("Storage connection error: {0}")]
    StorageConnection(String),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Search execution failure (bad vector shape, scoring error)
    #[error("Search error: {0}")]
    Search(String),

    /// Migration failure (partial copy, verification mismatch)
    #[error("Migration error: {0}")]
    Migration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        GraphError::Serialization(err.to_string())
    }
}
