//! Configuration for embedding providers

use serde::{Deserialize, Serialize};
use tutorgraph_core::vector;

use crate::error::{EmbeddingError, EmbeddingResult};

/// Maximum text length accepted for embedding, in characters
pub const MAX_EMBEDDING_INPUT_CHARS: usize = 100_000;

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of an OpenAI-compatible API
    pub endpoint: String,
    /// Bearer token; optional for local endpoints
    pub api_key: Option<String>,
    /// Model identifier sent with every request
    pub model: String,
    /// Expected embedding dimensionality for the model
    pub dimensions: usize,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Retry attempts for transient failures
    pub max_retries: u32,
    /// Base backoff delay, multiplied by the attempt number
    pub retry_base_delay_ms: u64,
    /// Monthly token budget; calls fail fast once exhausted
    pub monthly_token_quota: u64,
    /// Maximum entries in the content-addressed embedding cache
    pub cache_capacity: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            timeout_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 500,
            monthly_token_quota: 1_000_000,
            cache_capacity: 10_000,
        }
    }
}

impl EmbeddingConfig {
    /// OpenAI configuration with an API key and optional model override
    pub fn openai(api_key: String, model: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| "text-embedding-3-small".to_string());
        let dimensions = expected_dimensions_for_model(&model);
        Self {
            api_key: Some(api_key),
            model,
            dimensions,
            ..Default::default()
        }
    }

    /// Configuration for a local OpenAI-compatible endpoint (no API key)
    pub fn local(endpoint: String, model: String, dimensions: usize) -> Self {
        Self {
            endpoint,
            api_key: None,
            model,
            dimensions,
            ..Default::default()
        }
    }

    /// Validate the configuration before building a provider
    pub fn validate(&self) -> EmbeddingResult<()> {
        if self.endpoint.trim().is_empty() {
            return Err(EmbeddingError::ConfigError(
                "endpoint must not be empty".into(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(EmbeddingError::ConfigError(
                "model must not be empty".into(),
            ));
        }
        if !vector::is_supported_dimension(self.dimensions) {
            return Err(EmbeddingError::ConfigError(format!(
                "dimension {} is not supported (expected one of {:?})",
                self.dimensions,
                vector::SUPPORTED_DIMENSIONS
            )));
        }
        if self.endpoint.contains("api.openai.com")
            && self.api_key.as_deref().unwrap_or("").is_empty()
        {
            return Err(EmbeddingError::ConfigError(
                "api_key is required for the OpenAI endpoint".into(),
            ));
        }
        Ok(())
    }
}

/// Expected embedding dimensions for known models
pub fn expected_dimensions_for_model(model: &str) -> usize {
    match model {
        "text-embedding-3-small" => 1536,
        "text-embedding-3-large" => 3072,
        "text-embedding-ada-002" => 1536,
        "nomic-embed-text" => 768,
        _ => 1536,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = EmbeddingConfig::local(
            "http://localhost:11434/v1".into(),
            "nomic-embed-text".into(),
            768,
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_openai_requires_api_key() {
        let config = EmbeddingConfig::default();
        assert!(config.validate().is_err());

        let config = EmbeddingConfig::openai("sk-test".into(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_unsupported_dimension() {
        let mut config = EmbeddingConfig::openai("sk-test".into(), None);
        config.dimensions = 1000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_expected_dimensions() {
        assert_eq!(expected_dimensions_for_model("text-embedding-3-small"), 1536);
        assert_eq!(expected_dimensions_for_model("text-embedding-3-large"), 3072);
        assert_eq!(expected_dimensions_for_model("nomic-embed-text"), 768);
        assert_eq!(expected_dimensions_for_model("unknown"), 1536);
    }
}
