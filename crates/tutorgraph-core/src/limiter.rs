//! Sliding-window rate limiting per (caller, operation class)
//!
//! Protects the embedding provider and the storage backends from
//! cost/abuse. Explicitly constructed and injected rather than exposed as
//! a global, so tests can create isolated instances. State is
//! process-local by design; it resets on restart (single-instance
//! deployment assumption).

use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{GraphError, GraphResult};

/// Operation classes with distinct limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    /// Semantic search queries (tightest window)
    Search,
    /// Node/relationship ingestion
    Ingest,
    /// Direct embedding generation
    Embedding,
}

/// A request ceiling over a trailing window
#[derive(Debug, Clone, Copy)]
pub struct WindowLimit {
    pub max_requests: u32,
    pub window: Duration,
}

/// Per-operation-class limits
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub search: WindowLimit,
    pub ingest: WindowLimit,
    pub embedding: WindowLimit,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            search: WindowLimit {
                max_requests: 30,
                window: Duration::from_secs(60),
            },
            ingest: WindowLimit {
                max_requests: 100,
                window: Duration::from_secs(60),
            },
            embedding: WindowLimit {
                max_requests: 60,
                window: Duration::from_secs(60),
            },
        }
    }
}

impl RateLimitConfig {
    fn limit_for(&self, op: OperationClass) -> WindowLimit {
        match op {
            OperationClass::Search => self.search,
            OperationClass::Ingest => self.ingest,
            OperationClass::Embedding => self.embedding,
        }
    }
}

/// Usage snapshot for one (caller, operation) pair
#[derive(Debug, Clone, Copy)]
pub struct Usage {
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the oldest in-window request ages out; `None` when idle
    pub resets_in: Option<Duration>,
}

/// Sliding-window request throttle
///
/// Request timestamps are kept per (caller, operation class) in a
/// concurrency-safe map and pruned as they age out of the window.
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: DashMap<(String, OperationClass), Vec<Instant>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    /// Check and record a request
    ///
    /// Counts requests inside the trailing window. At or above the
    /// ceiling the call fails with `RateLimited` carrying the time until
    /// the window has room again, and the request is not recorded.
    pub fn check(&self, caller: &str, op: OperationClass) -> GraphResult<()> {
        let limit = self.config.limit_for(op);
        let now = Instant::now();
        let mut entry = self
            .windows
            .entry((caller.to_string(), op))
            .or_default();
        entry.retain(|t| now.duration_since(*t) < limit.window);

        if entry.len() >= limit.max_requests as usize {
            // Oldest in-window entry decides when room opens up
            let retry_after = entry
                .first()
                .map(|oldest| limit.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(limit.window);
            debug!(caller, ?op, retry_after = ?retry_after, "Rate limit exceeded");
            return Err(GraphError::RateLimited { retry_after });
        }

        entry.push(now);
        Ok(())
    }

    /// Current usage for one (caller, operation) pair
    pub fn usage(&self, caller: &str, op: OperationClass) -> Usage {
        let limit = self.config.limit_for(op);
        let now = Instant::now();
        let used = self
            .windows
            .get(&(caller.to_string(), op))
            .map(|entry| {
                entry
                    .iter()
                    .filter(|t| now.duration_since(**t) < limit.window)
                    .count() as u32
            })
            .unwrap_or(0);
        let resets_in = self
            .windows
            .get(&(caller.to_string(), op))
            .and_then(|entry| {
                entry
                    .iter()
                    .find(|t| now.duration_since(**t) < limit.window)
                    .map(|oldest| limit.window.saturating_sub(now.duration_since(*oldest)))
            });
        Usage {
            used,
            limit: limit.max_requests,
            remaining: limit.max_requests.saturating_sub(used),
            resets_in,
        }
    }

    /// Clear all counters for one caller
    pub fn reset(&self, caller: &str) {
        self.windows.retain(|(id, _), _| id != caller);
    }

    /// Drop entries older than their window so memory stays bounded
    ///
    /// Callers typically drive this from a `tokio::time::interval`.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.windows.retain(|(_, op), timestamps| {
            let window = self.config.limit_for(*op).window;
            timestamps.retain(|t| now.duration_since(*t) < window);
            !timestamps.is_empty()
        });
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
