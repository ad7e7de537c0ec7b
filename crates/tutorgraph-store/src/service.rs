//! Knowledge graph facade
//!
//! Fronts a `GraphStore` with per-caller rate limiting. Reads draw from
//! the search budget, writes from the ingest budget; administrative
//! surfaces (stats, export) are unthrottled. Payload validation lives in
//! the stores themselves so it holds for every code path; the caller id
//! is checked here, before it becomes a rate-limiter key.

use std::sync::Arc;
use tracing::instrument;

use tutorgraph_core::limiter::{OperationClass, RateLimiter, Usage};
use tutorgraph_core::validate;
use tutorgraph_core::types::{
    BatchStoreOutcome, DeleteReport, GraphSnapshot, GraphStats, Node, NodeInput,
    NodeWithRelationships, Relationship, RelationshipInput, SearchOptions, SearchResponse,
};
use tutorgraph_core::{GraphResult, GraphStore};

/// Rate-limited entry point over a storage backend
pub struct KnowledgeGraph {
    store: Arc<dyn GraphStore>,
    limiter: Arc<RateLimiter>,
}

impl KnowledgeGraph {
    pub fn new(store: Arc<dyn GraphStore>, limiter: Arc<RateLimiter>) -> Self {
        Self { store, limiter }
    }

    /// The backend behind this facade
    pub fn store(&self) -> Arc<dyn GraphStore> {
        Arc::clone(&self.store)
    }

    #[instrument(skip(self, input), fields(material_id = %input.material_id))]
    pub async fn store_node(&self, caller: &str, input: NodeInput) -> GraphResult<Node> {
        let caller = validate::validate_id(caller, "caller")?;
        self.limiter.check(&caller, OperationClass::Ingest)?;
        self.store.store_node(input).await
    }

    #[instrument(skip(self, inputs), fields(count = inputs.len()))]
    pub async fn store_batch_nodes(
        &self,
        caller: &str,
        inputs: Vec<NodeInput>,
    ) -> GraphResult<BatchStoreOutcome> {
        let caller = validate::validate_id(caller, "caller")?;
        self.limiter.check(&caller, OperationClass::Ingest)?;
        self.store.store_batch_nodes(inputs).await
    }

    #[instrument(skip(self, input))]
    pub async fn store_relationship(
        &self,
        caller: &str,
        input: RelationshipInput,
    ) -> GraphResult<Relationship> {
        let caller = validate::validate_id(caller, "caller")?;
        self.limiter.check(&caller, OperationClass::Ingest)?;
        self.store.store_relationship(input).await
    }

    #[instrument(skip(self, query, options))]
    pub async fn semantic_search(
        &self,
        caller: &str,
        query: &str,
        options: &SearchOptions,
    ) -> GraphResult<SearchResponse> {
        let caller = validate::validate_id(caller, "caller")?;
        self.limiter.check(&caller, OperationClass::Search)?;
        self.store.semantic_search(query, options).await
    }

    #[instrument(skip(self))]
    pub async fn get_nodes_by_material(
        &self,
        caller: &str,
        material_id: &str,
    ) -> GraphResult<Vec<NodeWithRelationships>> {
        let caller = validate::validate_id(caller, "caller")?;
        self.limiter.check(&caller, OperationClass::Search)?;
        self.store.get_nodes_by_material(material_id).await
    }

    #[instrument(skip(self))]
    pub async fn delete_material_graph(
        &self,
        caller: &str,
        material_id: &str,
    ) -> GraphResult<DeleteReport> {
        let caller = validate::validate_id(caller, "caller")?;
        self.limiter.check(&caller, OperationClass::Ingest)?;
        self.store.delete_material_graph(material_id).await
    }

    #[instrument(skip(self, known_materials), fields(known = known_materials.len()))]
    pub async fn cleanup_orphaned_nodes(
        &self,
        caller: &str,
        known_materials: &[String],
    ) -> GraphResult<u64> {
        let caller = validate::validate_id(caller, "caller")?;
        self.limiter.check(&caller, OperationClass::Ingest)?;
        self.store.cleanup_orphaned_nodes(known_materials).await
    }

    pub async fn stats(&self) -> GraphResult<GraphStats> {
        self.store.stats().await
    }

    pub async fn export_graph(&self) -> GraphResult<GraphSnapshot> {
        self.store.export_graph().await
    }

    /// Remaining budget for one caller and operation class
    pub fn usage(&self, caller: &str, op: OperationClass) -> Usage {
        self.limiter.usage(caller, op)
    }

    /// Clear all rate-limit state for one caller
    pub fn reset_limits(&self, caller: &str) {
        self.limiter.reset(caller);
    }
}
