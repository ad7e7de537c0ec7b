//! Backend factory
//!
//! Selects a `GraphStore` implementation from configuration so callers
//! depend on the trait alone and backends stay swappable.

use std::sync::Arc;
use tracing::info;

use tutorgraph_core::{GraphResult, GraphStore};
use tutorgraph_embeddings::EmbeddingService;

use crate::memory::MemoryGraphStore;
use crate::sqlite::{SqliteGraphStore, SqliteStoreConfig};

/// Which backend to construct
#[derive(Debug, Clone)]
pub enum StoreConfig {
    /// Ephemeral in-process store; data is lost on drop
    Memory,
    /// Persistent SQLite store
    Sqlite(SqliteStoreConfig),
}

/// Build a graph store from configuration
pub fn create_graph_store(
    config: StoreConfig,
    embedder: Arc<EmbeddingService>,
) -> GraphResult<Arc<dyn GraphStore>> {
    match config {
        StoreConfig::Memory => {
            info!("Creating in-memory graph store");
            Ok(Arc::new(MemoryGraphStore::new(embedder)))
        }
        StoreConfig::Sqlite(sqlite_config) => {
            info!(path = ?sqlite_config.path, "Creating SQLite graph store");
            Ok(Arc::new(SqliteGraphStore::new(sqlite_config, embedder)?))
        }
    }
}
