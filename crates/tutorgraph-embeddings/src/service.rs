//! Caching, quota, and retry layer over an embedding provider
//!
//! The service is the only thing storage backends talk to. It gates input
//! before any network call, serves repeated texts from a content-addressed
//! cache, enforces the monthly token quota, and retries transient provider
//! failures with increasing backoff. It returns errors instead of
//! panicking so callers can degrade (store a node vector-less, fall back
//! to keyword scoring).

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use tutorgraph_core::hashing::content_hash;
use tutorgraph_core::vector;

use crate::config::{EmbeddingConfig, MAX_EMBEDDING_INPUT_CHARS};
use crate::error::{EmbeddingError, EmbeddingResult};
use crate::provider::EmbeddingProvider;

/// Outcome of a single embedding generation
#[derive(Debug, Clone)]
pub struct EmbeddingOutcome {
    pub embedding: Vec<f32>,
    /// True when served from the cache; no provider call occurred
    pub cached: bool,
    /// Tokens billed for this call; zero on a cache hit
    pub tokens: u64,
}

/// Outcome of a batch embedding generation with per-item accounting
///
/// `successful + failed` always equals the input length; embeddings that
/// succeeded are returned even when others failed.
#[derive(Debug, Clone)]
pub struct BatchEmbeddingOutcome {
    /// Positionally aligned with the input; `None` where generation failed
    pub embeddings: Vec<Option<Vec<f32>>>,
    pub successful: usize,
    pub failed: usize,
    pub tokens: u64,
}

/// Month-stamped token usage counter
struct QuotaState {
    month: String,
    used: u64,
}

/// Embedding service: provider + cache + quota + retries
pub struct EmbeddingService {
    provider: Arc<dyn EmbeddingProvider>,
    config: EmbeddingConfig,
    /// Content-addressed cache: BLAKE3(text) -> vector
    cache: DashMap<String, Vec<f32>>,
    quota: Mutex<QuotaState>,
}

impl EmbeddingService {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: EmbeddingConfig) -> Self {
        Self {
            provider,
            config,
            cache: DashMap::new(),
            quota: Mutex::new(QuotaState {
                month: current_month(),
                used: 0,
            }),
        }
    }

    /// Expected vector dimensionality of the underlying provider
    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    /// Tokens consumed in the current month
    pub fn quota_used(&self) -> u64 {
        let mut state = self.quota.lock();
        roll_month(&mut state);
        state.used
    }

    /// Number of cached embeddings
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Generate an embedding for one text
    ///
    /// Input is gated before any network call; a cache hit returns
    /// `cached: true, tokens: 0` without touching the provider; transient
    /// provider failures are retried up to the configured attempt count
    /// with increasing backoff.
    pub async fn generate(&self, text: &str) -> EmbeddingResult<EmbeddingOutcome> {
        let text = gate_input(text)?;

        let key = content_hash(&text);
        if let Some(hit) = self.cache.get(&key) {
            debug!("Embedding cache hit");
            return Ok(EmbeddingOutcome {
                embedding: hit.clone(),
                cached: true,
                tokens: 0,
            });
        }

        self.check_quota()?;

        let response = self.embed_with_retries(&text).await?;
        if !vector::is_supported_dimension(response.embedding.len()) {
            return Err(EmbeddingError::InvalidResponse(format!(
                "provider returned unsupported dimension {}",
                response.embedding.len()
            )));
        }

        let tokens = response
            .tokens
            .unwrap_or_else(|| estimate_tokens(&text));
        self.record_tokens(tokens);
        self.cache_insert(key, response.embedding.clone());

        Ok(EmbeddingOutcome {
            embedding: response.embedding,
            cached: false,
            tokens,
        })
    }

    /// Generate embeddings for many texts with per-item accounting
    ///
    /// Uncached texts go out in one batched provider call where possible;
    /// if that call ultimately fails, generation falls back to per-item
    /// calls so individual texts can still succeed. The quota is checked
    /// once up front and the call fails fast when it is exhausted.
    pub async fn generate_batch(
        &self,
        texts: &[String],
    ) -> EmbeddingResult<BatchEmbeddingOutcome> {
        let mut embeddings: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut failed = 0usize;
        let mut tokens = 0u64;

        // Serve what we can from the cache, reject what never should go out
        let mut pending: Vec<(usize, String)> = Vec::new();
        for (i, raw) in texts.iter().enumerate() {
            match gate_input(raw) {
                Ok(text) => {
                    let key = content_hash(&text);
                    if let Some(hit) = self.cache.get(&key) {
                        embeddings[i] = Some(hit.clone());
                    } else {
                        pending.push((i, text));
                    }
                }
                Err(err) => {
                    warn!(index = i, %err, "Rejected batch item before provider call");
                    failed += 1;
                }
            }
        }

        if !pending.is_empty() {
            self.check_quota()?;

            let pending_texts: Vec<String> = pending.iter().map(|(_, t)| t.clone()).collect();
            match self.embed_batch_with_retries(&pending_texts).await {
                Ok(responses) => {
                    for ((i, text), response) in pending.iter().zip(responses) {
                        let item_tokens = response
                            .tokens
                            .unwrap_or_else(|| estimate_tokens(text));
                        tokens += item_tokens;
                        self.cache_insert(content_hash(text), response.embedding.clone());
                        embeddings[*i] = Some(response.embedding);
                    }
                    self.record_tokens(tokens);
                }
                Err(batch_err) => {
                    // One bad item can sink a whole batch call; fall back to
                    // per-item generation so the rest still succeeds
                    warn!(%batch_err, "Batch embedding call failed, retrying per item");
                    for (i, text) in &pending {
                        match self.embed_with_retries(text).await {
                            Ok(response) => {
                                let item_tokens = response
                                    .tokens
                                    .unwrap_or_else(|| estimate_tokens(text));
                                tokens += item_tokens;
                                self.cache_insert(content_hash(text), response.embedding.clone());
                                embeddings[*i] = Some(response.embedding);
                            }
                            Err(err) => {
                                warn!(index = i, %err, "Embedding failed for batch item");
                                failed += 1;
                            }
                        }
                    }
                    self.record_tokens(tokens);
                }
            }
        }

        let successful = texts.len() - failed;
        Ok(BatchEmbeddingOutcome {
            embeddings,
            successful,
            failed,
            tokens,
        })
    }

    async fn embed_with_retries(
        &self,
        text: &str,
    ) -> EmbeddingResult<crate::provider::EmbeddingResponse> {
        let mut last_err = None;
        for attempt in 1..=self.config.max_retries {
            match self.provider.embed(text).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_transient() && attempt < self.config.max_retries => {
                    let delay =
                        Duration::from_millis(self.config.retry_base_delay_ms * attempt as u64);
                    warn!(attempt, %err, delay_ms = delay.as_millis() as u64, "Transient embedding failure, backing off");
                    tokio::time::sleep(delay).await;
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or_else(|| EmbeddingError::HttpError("retries exhausted".into())))
    }

    async fn embed_batch_with_retries(
        &self,
        texts: &[String],
    ) -> EmbeddingResult<Vec<crate::provider::EmbeddingResponse>> {
        let mut last_err = None;
        for attempt in 1..=self.config.max_retries {
            match self.provider.embed_batch(texts.to_vec()).await {
                Ok(responses) => return Ok(responses),
                Err(err) if err.is_transient() && attempt < self.config.max_retries => {
                    let delay =
                        Duration::from_millis(self.config.retry_base_delay_ms * attempt as u64);
                    warn!(attempt, %err, "Transient batch embedding failure, backing off");
                    tokio::time::sleep(delay).await;
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or_else(|| EmbeddingError::HttpError("retries exhausted".into())))
    }

    fn check_quota(&self) -> EmbeddingResult<()> {
        let mut state = self.quota.lock();
        roll_month(&mut state);
        if state.used >= self.config.monthly_token_quota {
            return Err(EmbeddingError::QuotaExceeded {
                used: state.used,
                quota: self.config.monthly_token_quota,
            });
        }
        Ok(())
    }

    fn record_tokens(&self, tokens: u64) {
        let mut state = self.quota.lock();
        roll_month(&mut state);
        state.used += tokens;
    }

    fn cache_insert(&self, key: String, embedding: Vec<f32>) {
        // Bounded cache: stop inserting at capacity rather than evicting;
        // repeated content still hits existing entries
        if self.cache.len() < self.config.cache_capacity {
            self.cache.insert(key, embedding);
        }
    }
}

/// Reject invalid input without any network call; returns trimmed text
fn gate_input(text: &str) -> EmbeddingResult<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(EmbeddingError::InvalidInput(
            "text must not be empty".into(),
        ));
    }
    let length = trimmed.chars().count();
    if length > MAX_EMBEDDING_INPUT_CHARS {
        return Err(EmbeddingError::TextTooLong {
            length,
            max: MAX_EMBEDDING_INPUT_CHARS,
        });
    }
    Ok(trimmed.to_string())
}

/// Rough token estimate when the provider reports no usage
fn estimate_tokens(text: &str) -> u64 {
    (text.len() as u64 / 4).max(1)
}

fn current_month() -> String {
    chrono::Utc::now().format("%Y-%m").to_string()
}

fn roll_month(state: &mut QuotaState) {
    let now = current_month();
    if state.month != now {
        state.month = now;
        state.used = 0;
    }
}
