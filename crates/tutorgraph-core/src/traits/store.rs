//! Storage abstraction trait
//!
//! The formal contract shared by the in-memory and SQLite backends. Both
//! must behave identically for every operation here; the integration test
//! suite runs the same scenarios against each.
//!
//! ## Thread Safety
//!
//! Implementations must be Send + Sync to enable use across async
//! boundaries.

use async_trait::async_trait;

use crate::error::GraphResult;
use crate::types::{
    BatchStoreOutcome, DeleteReport, GraphSnapshot, GraphStats, Node, NodeInput,
    NodeWithRelationships, Relationship, RelationshipInput, SearchOptions, SearchResponse,
};

/// Unified storage abstraction for the knowledge graph
///
/// Selected via `tutorgraph_store::create_graph_store`, keyed on whether a
/// persistent backend is configured.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Validate, embed (when no vector is supplied), and persist one node
    ///
    /// On embedding provider failure the node is stored without a vector
    /// rather than failing the request.
    async fn store_node(&self, input: NodeInput) -> GraphResult<Node>;

    /// Persist many nodes
    ///
    /// Missing embeddings are obtained in one batched provider call.
    /// Persistence happens in fixed-size chunks; each chunk is atomic,
    /// the batch as a whole is not. A mid-batch storage failure leaves a
    /// prefix of whole chunks durably stored; the outcome reports that
    /// prefix in `nodes` and the unpersisted remainder in `failed`
    /// instead of discarding it behind an error.
    async fn store_batch_nodes(&self, inputs: Vec<NodeInput>) -> GraphResult<BatchStoreOutcome>;

    /// Upsert a relationship by its (source, target, type) identity
    ///
    /// A repeated call updates weight/metadata instead of duplicating;
    /// `created_at` is preserved. Both endpoints must exist.
    async fn store_relationship(&self, input: RelationshipInput) -> GraphResult<Relationship>;

    /// Rank candidate nodes against a query
    ///
    /// Candidates are filtered by the optional material/course ids,
    /// scored (cosine when vectors are available, keyword overlap
    /// otherwise), thresholded, sorted by descending similarity with ties
    /// broken by node id ascending, and truncated to the limit.
    async fn semantic_search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> GraphResult<SearchResponse>;

    /// Nodes of one material ordered by chunk index ascending, each
    /// annotated with its incident relationships
    async fn get_nodes_by_material(
        &self,
        material_id: &str,
    ) -> GraphResult<Vec<NodeWithRelationships>>;

    /// Delete a material's nodes and every relationship touching them
    ///
    /// Idempotent: repeated calls after the first return zero counts,
    /// not an error.
    async fn delete_material_graph(&self, material_id: &str) -> GraphResult<DeleteReport>;

    /// Remove nodes whose material id is not in the given authoritative
    /// list, plus relationships left dangling; returns the removed count
    async fn cleanup_orphaned_nodes(&self, known_materials: &[String]) -> GraphResult<u64>;

    /// Aggregate counts over the stored graph
    async fn stats(&self) -> GraphResult<GraphStats>;

    /// Full export of nodes and relationships (backup/migration)
    async fn export_graph(&self) -> GraphResult<GraphSnapshot>;
}
