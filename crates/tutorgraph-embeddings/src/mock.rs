//! Mock provider for testing
//!
//! Produces deterministic hash-seeded vectors so tests never depend on a
//! live provider, with optional failure injection for exercising retry
//! and degradation paths.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{EmbeddingError, EmbeddingResult};
use crate::provider::{EmbeddingProvider, EmbeddingResponse};

/// Deterministic mock embedding provider
pub struct MockEmbeddingProvider {
    dimensions: usize,
    model: String,
    call_count: AtomicUsize,
    /// Fail this many calls before succeeding
    failures_remaining: Mutex<u32>,
    /// Always fail, regardless of counters
    fail_always: bool,
    /// Fail only for these exact texts
    fail_texts: HashSet<String>,
}

impl MockEmbeddingProvider {
    /// Create a mock producing vectors of the given dimensionality
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions,
            model: "mock-embed".to_string(),
            call_count: AtomicUsize::new(0),
            failures_remaining: Mutex::new(0),
            fail_always: false,
            fail_texts: HashSet::new(),
        }
    }

    /// Fail the next `n` provider calls with a transient error
    pub fn fail_times(mut self, n: u32) -> Self {
        self.failures_remaining = Mutex::new(n);
        self
    }

    /// Fail every call
    pub fn fail_always(mut self) -> Self {
        self.fail_always = true;
        self
    }

    /// Fail only for the given text
    pub fn fail_for_text(mut self, text: &str) -> Self {
        self.fail_texts.insert(text.to_string());
        self
    }

    /// Number of provider calls made (cache hits never reach here)
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    fn check_failure(&self) -> EmbeddingResult<()> {
        if self.fail_always {
            return Err(EmbeddingError::HttpError("injected failure".into()));
        }
        let mut remaining = self.failures_remaining.lock();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(EmbeddingError::HttpError("injected transient failure".into()));
        }
        Ok(())
    }

    /// Deterministic vector seeded from the text's hash, unit-normalized
    fn vector_for(&self, text: &str) -> Vec<f32> {
        let hash = blake3_bytes(text);
        let mut state = u64::from_le_bytes(hash[..8].try_into().unwrap());
        let mut v: Vec<f32> = (0..self.dimensions)
            .map(|_| {
                // xorshift64
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state as f64 / u64::MAX as f64) as f32 - 0.5
            })
            .collect();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }

    fn response_for(&self, text: &str) -> EmbeddingResult<EmbeddingResponse> {
        if self.fail_texts.contains(text) {
            return Err(EmbeddingError::HttpError(format!(
                "injected failure for text: {text}"
            )));
        }
        Ok(EmbeddingResponse {
            embedding: self.vector_for(text),
            model: self.model.clone(),
            dimensions: self.dimensions,
            tokens: Some(text.split_whitespace().count() as u64),
        })
    }
}

fn blake3_bytes(text: &str) -> [u8; 32] {
    *blake3::hash(text.as_bytes()).as_bytes()
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> EmbeddingResult<EmbeddingResponse> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.check_failure()?;
        self.response_for(text)
    }

    async fn embed_batch(&self, texts: Vec<String>) -> EmbeddingResult<Vec<EmbeddingResponse>> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.check_failure()?;
        texts.iter().map(|t| self.response_for(t)).collect()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}
