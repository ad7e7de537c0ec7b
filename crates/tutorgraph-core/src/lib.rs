//! Core types and contracts for the Tutorgraph retrieval subsystem
//!
//! This crate defines everything the storage backends and the embedding
//! layer share: the graph data model, the error taxonomy, the `GraphStore`
//! trait, input validation, vector scoring helpers, the sliding-window rate
//! limiter, and the recovery classifier that centralizes retry/fallback
//! policy.
//!
//! Backend crates depend on this crate and implement its traits; nothing
//! here performs I/O.

pub mod error;
pub mod hashing;
pub mod limiter;
pub mod recovery;
pub mod traits;
pub mod types;
pub mod validate;
pub mod vector;

pub use error::{GraphError, GraphResult};
pub use traits::GraphStore;
pub use types::{
    BatchStoreOutcome, DeleteReport, GraphSnapshot, GraphStats, Node, NodeInput,
    NodeWithRelationships, Relationship, RelationshipInput, SearchOptions, SearchResponse,
    SearchResult,
};
