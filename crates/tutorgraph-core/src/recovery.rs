//! Failure classification into recovery directives
//!
//! Every component routes its failures through `classify` so the
//! retry/fallback policy lives in one place instead of being duplicated
//! at each call site. Classification is pure apart from tracing output.

use std::time::Duration;
use tracing::{error, warn};

use crate::error::GraphError;

/// Where a failure originated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureContext {
    /// Direct embedding generation
    Embedding,
    /// Semantic search
    Search,
    /// Node/relationship persistence
    Store,
    /// Backend-to-backend migration
    Migration,
}

/// Degraded mode to fall back to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackMode {
    /// Score by keyword overlap instead of vectors
    KeywordSearch,
    /// Persist the node without an embedding
    StoreWithoutEmbedding,
    /// Storage backend unreachable; recommend the in-memory backend
    MemoryBackend,
}

/// Recovery directive for a classified failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Transient; retry after the given delay
    Retry { after: Duration },
    /// Degrade into the given mode and keep serving
    Fallback(FallbackMode),
    /// Skip the failed piece and keep going (per-item batch failures)
    Continue,
    /// Surface to the caller/operator; no internal retry
    Fatal,
}

/// Base delay for transient retries; multiplied by the attempt number
pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Classify a failure into a recovery directive
pub fn classify(context: FailureContext, err: &GraphError) -> Recovery {
    match err {
        // Rejected before any I/O; retrying cannot help
        GraphError::Validation(_) => Recovery::Fatal,

        // The error itself carries the retry-after hint for the caller
        GraphError::RateLimited { .. } => Recovery::Fatal,

        GraphError::Provider(msg) => match context {
            FailureContext::Search => {
                warn!(%msg, "Embedding provider failed during search, falling back to keyword scoring");
                Recovery::Fallback(FallbackMode::KeywordSearch)
            }
            FailureContext::Store => {
                warn!(%msg, "Embedding provider failed during ingestion, storing without embedding");
                Recovery::Fallback(FallbackMode::StoreWithoutEmbedding)
            }
            FailureContext::Embedding => Recovery::Retry {
                after: RETRY_BASE_DELAY,
            },
            FailureContext::Migration => Recovery::Continue,
        },

        GraphError::ProviderAuth(msg) => {
            error!(%msg, "Embedding API key rejected; operator action required");
            Recovery::Fatal
        }

        GraphError::QuotaExceeded { used, quota } => {
            error!(used, quota, "Monthly token quota exhausted; operator action required");
            Recovery::Fatal
        }

        GraphError::StorageConnection(msg) => {
            error!(%msg, "Storage backend unreachable; recommend in-memory backend");
            Recovery::Fallback(FallbackMode::MemoryBackend)
        }

        GraphError::Storage(_) => Recovery::Retry {
            after: RETRY_BASE_DELAY,
        },

        GraphError::NotFound(_) => Recovery::Continue,

        GraphError::Search(msg) => {
            warn!(%msg, "Search execution failed, falling back to keyword scoring");
            Recovery::Fallback(FallbackMode::KeywordSearch)
        }

        GraphError::Migration(msg) => {
            error!(%msg, "Migration failure; backup retained for manual rollback");
            Recovery::Fatal
        }

        GraphError::Serialization(_) => Recovery::Fatal,
    }
}
