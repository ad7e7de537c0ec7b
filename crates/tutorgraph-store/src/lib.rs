//! Storage backends for the Tutorgraph knowledge graph
//!
//! Two interchangeable `GraphStore` implementations, an ephemeral
//! in-memory store and a persistent SQLite store, plus the backend
//! factory, the migration service that copies data between them, and the
//! `KnowledgeGraph` facade that wires validation and rate limiting in
//! front of a store.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tutorgraph_store::{create_graph_store, StoreConfig, KnowledgeGraph};
//! use tutorgraph_embeddings::create_mock_service;
//! use std::sync::Arc;
//!
//! let embedder = Arc::new(create_mock_service(768));
//! let store = create_graph_store(StoreConfig::Memory, embedder)?;
//! let graph = KnowledgeGraph::new(store, Arc::new(Default::default()));
//! ```

mod embed;
pub mod factory;
pub mod memory;
pub mod migration;
pub mod scoring;
pub mod service;
pub mod sqlite;

// Re-exports
pub use factory::{create_graph_store, StoreConfig};
pub use memory::MemoryGraphStore;
pub use migration::{
    IssueKind, MigrationOptions, MigrationReport, MigrationService, MigrationStatus,
    VerificationIssue, VerificationReport,
};
pub use service::KnowledgeGraph;
pub use sqlite::{QueryCacheConfig, SqliteGraphStore, SqliteStoreConfig};

/// Records persisted per atomic chunk during batch operations
pub const BATCH_CHUNK_SIZE: usize = 50;
