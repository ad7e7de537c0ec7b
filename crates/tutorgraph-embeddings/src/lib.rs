//! Embedding provider abstraction for semantic search
//!
//! This crate provides a unified interface for generating text embeddings
//! with built-in resilience patterns: content-addressed caching, bounded
//! retries with increasing backoff, and monthly token quota accounting.
//!
//! The `EmbeddingService` never panics on provider failure; it returns a
//! typed error so callers can choose to persist a node without a vector or
//! fall back to keyword scoring.

/// Configuration for embedding providers.
pub mod config;

/// Error types for embedding operations.
pub mod error;

/// OpenAI-compatible HTTP provider implementation.
pub mod http;

/// Mock provider for testing.
pub mod mock;

/// Provider trait and common functionality.
pub mod provider;

/// Caching, quota, and retry layer over a provider.
pub mod service;

pub use config::EmbeddingConfig;
pub use error::{EmbeddingError, EmbeddingResult};
pub use http::HttpEmbeddingProvider;
pub use mock::MockEmbeddingProvider;
pub use provider::{EmbeddingProvider, EmbeddingResponse};
pub use service::{BatchEmbeddingOutcome, EmbeddingOutcome, EmbeddingService};

use std::sync::Arc;

/// Create an embedding service from configuration
///
/// Validates the configuration, builds the HTTP provider, and wraps it
/// with the caching/quota/retry layer.
pub fn create_service(config: EmbeddingConfig) -> EmbeddingResult<EmbeddingService> {
    config.validate()?;
    let provider = HttpEmbeddingProvider::new(config.clone())?;
    Ok(EmbeddingService::new(Arc::new(provider), config))
}

/// Create a mock-backed embedding service for testing
pub fn create_mock_service(dimensions: usize) -> EmbeddingService {
    let provider = Arc::new(mock::MockEmbeddingProvider::with_dimensions(dimensions));
    EmbeddingService::new(provider, EmbeddingConfig::default())
}
