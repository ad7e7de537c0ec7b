//! OpenAI-compatible HTTP embedding provider
//!
//! Talks to any endpoint implementing the `/embeddings` API shape
//! (OpenAI, Ollama's OpenAI compatibility layer, vLLM). All requests are
//! built with typed serde structs; nothing is string-interpolated.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::error::{EmbeddingError, EmbeddingResult};
use crate::provider::{EmbeddingProvider, EmbeddingResponse};

/// OpenAI-compatible embedding provider
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    config: EmbeddingConfig,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Deserialize)]
struct UsageInfo {
    #[serde(default)]
    total_tokens: u64,
}

impl HttpEmbeddingProvider {
    /// Create a new provider from validated configuration
    pub fn new(config: EmbeddingConfig) -> EmbeddingResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::ConfigError(format!("failed to build client: {e}")))?;
        Ok(Self { client, config })
    }

    async fn request(&self, inputs: &[String]) -> EmbeddingResult<Vec<EmbeddingResponse>> {
        let url = format!("{}/embeddings", self.config.endpoint.trim_end_matches('/'));
        let body = EmbeddingsRequest {
            model: &self.config.model,
            input: inputs,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        debug!(count = inputs.len(), model = %self.config.model, "Requesting embeddings");
        let response = request
            .send()
            .await
            .map_err(|e| EmbeddingError::HttpError(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            let text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::AuthError(format!(
                "provider rejected credentials ({status}): {text}"
            )));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::RateLimited(format!(
                "provider throttled the request: {text}"
            )));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::HttpError(format!(
                "provider error ({status}): {text}"
            )));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(format!("failed to parse response: {e}")))?;

        if parsed.data.len() != inputs.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                parsed.data.len()
            )));
        }

        let total_tokens = parsed.usage.map(|u| u.total_tokens);
        let per_item_tokens = total_tokens.map(|t| t / inputs.len() as u64);

        // The API may return items out of order; realign by index
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);

        Ok(data
            .into_iter()
            .map(|d| {
                let dimensions = d.embedding.len();
                EmbeddingResponse {
                    embedding: d.embedding,
                    model: self.config.model.clone(),
                    dimensions,
                    tokens: per_item_tokens,
                }
            })
            .collect())
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> EmbeddingResult<EmbeddingResponse> {
        let mut responses = self.request(&[text.to_string()]).await?;
        responses
            .pop()
            .ok_or_else(|| EmbeddingError::InvalidResponse("empty response data".into()))
    }

    async fn embed_batch(&self, texts: Vec<String>) -> EmbeddingResult<Vec<EmbeddingResponse>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(&texts).await
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn provider_name(&self) -> &str {
        "http"
    }
}
