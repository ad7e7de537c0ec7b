//! In-memory graph store
//!
//! Ephemeral backend over concurrency-safe maps. Used when no persistent
//! backend is configured, as the fallback recommendation when the SQLite
//! backend is unreachable, and as the reference implementation the SQLite
//! store must behave identically to.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use tutorgraph_core::types::{
    BatchStoreOutcome, DeleteReport, GraphSnapshot, GraphStats, Node, NodeInput,
    NodeWithRelationships, Relationship, RelationshipInput, SearchOptions, SearchResponse,
};
use tutorgraph_core::{validate, GraphError, GraphResult, GraphStore};
use tutorgraph_embeddings::EmbeddingService;

use crate::embed;
use crate::scoring;
use crate::BATCH_CHUNK_SIZE;

/// Ephemeral `GraphStore` over dashmaps
pub struct MemoryGraphStore {
    embedder: Arc<EmbeddingService>,
    nodes: DashMap<String, Node>,
    relationships: DashMap<String, Relationship>,
}

impl MemoryGraphStore {
    pub fn new(embedder: Arc<EmbeddingService>) -> Self {
        Self {
            embedder,
            nodes: DashMap::new(),
            relationships: DashMap::new(),
        }
    }

    fn candidates(&self, options: &SearchOptions) -> Vec<Node> {
        self.nodes
            .iter()
            .filter(|entry| {
                options
                    .material_id
                    .as_deref()
                    .map_or(true, |m| entry.material_id == m)
                    && options
                        .course_id
                        .as_deref()
                        .map_or(true, |c| entry.course_id == c)
            })
            .map(|entry| entry.clone())
            .collect()
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn store_node(&self, mut input: NodeInput) -> GraphResult<Node> {
        validate::validate_node_input(&mut input)?;
        let (embedding, degraded) = embed::resolve_embedding(&self.embedder, &input).await?;
        let node = embed::build_node(input, embedding);
        if degraded {
            debug!(node_id = %node.id, "Stored node without embedding");
        }
        self.nodes.insert(node.id.clone(), node.clone());
        Ok(node)
    }

    async fn store_batch_nodes(&self, inputs: Vec<NodeInput>) -> GraphResult<BatchStoreOutcome> {
        let mut validated = Vec::with_capacity(inputs.len());
        for mut input in inputs {
            validate::validate_node_input(&mut input)?;
            validated.push(input);
        }

        let embeddings = embed::resolve_batch_embeddings(&self.embedder, &validated).await?;

        // Map inserts cannot fail mid-batch, so `failed` stays zero here
        let mut outcome = BatchStoreOutcome {
            nodes: Vec::with_capacity(validated.len()),
            embedded: 0,
            degraded: 0,
            failed: 0,
        };
        // Chunked for parity with the transactional backend
        let paired: Vec<(NodeInput, Option<Vec<f32>>)> =
            validated.into_iter().zip(embeddings).collect();
        for chunk in paired.chunks(BATCH_CHUNK_SIZE) {
            for (input, embedding) in chunk.iter().cloned() {
                if embedding.is_some() {
                    outcome.embedded += 1;
                } else {
                    outcome.degraded += 1;
                }
                let node = embed::build_node(input, embedding);
                self.nodes.insert(node.id.clone(), node.clone());
                outcome.nodes.push(node);
            }
        }
        Ok(outcome)
    }

    async fn store_relationship(&self, mut input: RelationshipInput) -> GraphResult<Relationship> {
        validate::validate_relationship_input(&mut input)?;
        if !self.nodes.contains_key(&input.source_node_id) {
            return Err(GraphError::NotFound(format!(
                "source node {}",
                input.source_node_id
            )));
        }
        if !self.nodes.contains_key(&input.target_node_id) {
            return Err(GraphError::NotFound(format!(
                "target node {}",
                input.target_node_id
            )));
        }

        let id = input.derived_id();
        let relationship = match self.relationships.get(&id) {
            // Upsert by identity triple: refresh weight/metadata, keep created_at
            Some(existing) => Relationship {
                weight: input.weight.unwrap_or(existing.weight),
                metadata: input.metadata,
                ..existing.clone()
            },
            None => Relationship {
                id: id.clone(),
                source_node_id: input.source_node_id,
                target_node_id: input.target_node_id,
                relationship_type: input.relationship_type,
                weight: input.weight.unwrap_or(1.0),
                metadata: input.metadata,
                created_at: Utc::now(),
            },
        };
        self.relationships.insert(id, relationship.clone());
        Ok(relationship)
    }

    async fn semantic_search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> GraphResult<SearchResponse> {
        let query = validate::validate_query(query)?;
        validate::validate_search_options(options)?;

        let query_embedding = match self.embedder.generate(&query).await {
            Ok(outcome) => Some(outcome.embedding),
            Err(err) => {
                let err: GraphError = err.into();
                tutorgraph_core::recovery::classify(
                    tutorgraph_core::recovery::FailureContext::Search,
                    &err,
                );
                None
            }
        };

        let candidates = self.candidates(options);
        let (results, degraded) =
            scoring::rank_candidates(&query, query_embedding.as_deref(), candidates, options);
        Ok(SearchResponse {
            results,
            cached: false,
            degraded,
        })
    }

    async fn get_nodes_by_material(
        &self,
        material_id: &str,
    ) -> GraphResult<Vec<NodeWithRelationships>> {
        let material_id = validate::validate_id(material_id, "material_id")?;
        let mut nodes: Vec<Node> = self
            .nodes
            .iter()
            .filter(|entry| entry.material_id == material_id)
            .map(|entry| entry.clone())
            .collect();
        nodes.sort_by(|a, b| a.chunk_index.cmp(&b.chunk_index).then_with(|| a.id.cmp(&b.id)));

        Ok(nodes
            .into_iter()
            .map(|node| {
                let relationships = self
                    .relationships
                    .iter()
                    .filter(|r| r.source_node_id == node.id || r.target_node_id == node.id)
                    .map(|r| r.clone())
                    .collect();
                NodeWithRelationships {
                    node,
                    relationships,
                }
            })
            .collect())
    }

    async fn delete_material_graph(&self, material_id: &str) -> GraphResult<DeleteReport> {
        let material_id = validate::validate_id(material_id, "material_id")?;
        let doomed: Vec<String> = self
            .nodes
            .iter()
            .filter(|entry| entry.material_id == material_id)
            .map(|entry| entry.id.clone())
            .collect();

        for id in &doomed {
            self.nodes.remove(id);
        }

        let before = self.relationships.len();
        self.relationships.retain(|_, r| {
            !doomed.contains(&r.source_node_id) && !doomed.contains(&r.target_node_id)
        });
        let deleted_relationships = (before - self.relationships.len()) as u64;

        let report = DeleteReport {
            deleted_nodes: doomed.len() as u64,
            deleted_relationships,
        };
        info!(%material_id, deleted_nodes = report.deleted_nodes, deleted_relationships = report.deleted_relationships, "Deleted material graph");
        Ok(report)
    }

    async fn cleanup_orphaned_nodes(&self, known_materials: &[String]) -> GraphResult<u64> {
        let orphaned: Vec<String> = self
            .nodes
            .iter()
            .filter(|entry| !known_materials.contains(&entry.material_id))
            .map(|entry| entry.id.clone())
            .collect();

        for id in &orphaned {
            self.nodes.remove(id);
        }
        let before = self.relationships.len();
        self.relationships.retain(|_, r| {
            self.nodes.contains_key(&r.source_node_id) && self.nodes.contains_key(&r.target_node_id)
        });
        let removed = orphaned.len() as u64 + (before - self.relationships.len()) as u64;
        if removed > 0 {
            info!(removed, "Cleaned up orphaned graph records");
        }
        Ok(removed)
    }

    async fn stats(&self) -> GraphResult<GraphStats> {
        let mut materials: HashMap<String, u64> = HashMap::new();
        for entry in self.nodes.iter() {
            *materials.entry(entry.material_id.clone()).or_insert(0) += 1;
        }
        Ok(GraphStats {
            node_count: self.nodes.len() as u64,
            relationship_count: self.relationships.len() as u64,
            materials,
        })
    }

    async fn export_graph(&self) -> GraphResult<GraphSnapshot> {
        Ok(GraphSnapshot {
            nodes: self.nodes.iter().map(|e| e.clone()).collect(),
            relationships: self.relationships.iter().map(|e| e.clone()).collect(),
            exported_at: Utc::now(),
        })
    }
}
