//! Provider trait and common functionality

use async_trait::async_trait;

use crate::error::EmbeddingResult;

/// A single embedding with provider metadata
#[derive(Debug, Clone)]
pub struct EmbeddingResponse {
    /// The vector itself
    pub embedding: Vec<f32>,
    /// Model that produced it
    pub model: String,
    /// Vector length
    pub dimensions: usize,
    /// Billed tokens, when the provider reports usage
    pub tokens: Option<u64>,
}

/// Abstract interface for embedding generation
///
/// Implementations must be Send + Sync; they are shared behind an `Arc`
/// across concurrent requests.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> EmbeddingResult<EmbeddingResponse>;

    /// Generate embeddings for many texts in one call where possible
    ///
    /// The returned vector is positionally aligned with the input.
    async fn embed_batch(&self, texts: Vec<String>) -> EmbeddingResult<Vec<EmbeddingResponse>>;

    /// Expected vector dimensionality
    fn dimensions(&self) -> usize;

    /// Model identifier
    fn model_name(&self) -> &str;

    /// Short provider name for logs
    fn provider_name(&self) -> &str;
}
