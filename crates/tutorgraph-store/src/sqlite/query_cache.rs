//! Query-result cache for the SQLite backend
//!
//! Keyed by a content hash of (query, options), honoring a TTL and a
//! maximum entry count with oldest-entry eviction on overflow. A hit
//! skips the embedding provider and the database entirely. Process-local
//! by design.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use tutorgraph_core::hashing::content_hash;
use tutorgraph_core::types::{SearchOptions, SearchResponse};

/// Cache tuning knobs
#[derive(Debug, Clone)]
pub struct QueryCacheConfig {
    pub ttl: Duration,
    pub max_entries: usize,
}

impl Default for QueryCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_entries: 1_000,
        }
    }
}

struct CachedEntry {
    response: SearchResponse,
    cached_at: Instant,
}

/// TTL + capacity bounded search-result cache
pub struct QueryCache {
    entries: DashMap<String, CachedEntry>,
    config: QueryCacheConfig,
}

impl QueryCache {
    pub fn new(config: QueryCacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    /// Cache key for a (query, options) pair
    pub fn key_for(query: &str, options: &SearchOptions) -> String {
        let options_repr = serde_json::to_string(options).unwrap_or_default();
        content_hash(&format!("{query}|{options_repr}"))
    }

    /// Look up a prior response; expired entries are removed on read
    pub fn get(&self, key: &str) -> Option<SearchResponse> {
        let expired = match self.entries.get(key) {
            Some(entry) => {
                if entry.cached_at.elapsed() <= self.config.ttl {
                    debug!("Query cache hit");
                    let mut response = entry.response.clone();
                    response.cached = true;
                    return Some(response);
                }
                true
            }
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    /// Store a response, evicting the oldest entry on overflow
    pub fn insert(&self, key: String, response: SearchResponse) {
        if self.entries.len() >= self.config.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.cached_at)
                .map(|entry| entry.key().clone());
            if let Some(oldest_key) = oldest {
                self.entries.remove(&oldest_key);
            }
        }
        self.entries.insert(
            key,
            CachedEntry {
                response,
                cached_at: Instant::now(),
            },
        );
    }

    /// Drop everything; called on any write to the graph
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
