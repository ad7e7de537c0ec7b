//! Graph data model
//!
//! Nodes are content-bearing vertices produced by the upstream chunking
//! pipeline; relationships are typed, weighted, directed edges between
//! them. Materials and courses are owned by the external content-management
//! system and referenced here only by id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::hashing;

/// A stored, embeddable content chunk with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique node id (UUID v4, assigned at storage time)
    pub id: String,
    /// Owning course, externally managed
    pub course_id: String,
    /// Owning material, externally managed; the unit of bulk deletion
    pub material_id: String,
    /// The text chunk itself
    pub content: String,
    /// Position of this chunk within its source material
    pub chunk_index: u32,
    /// Open key/value metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Fixed-length vector; absent in degraded (keyword-only) mode
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input record for node creation, as supplied by the upstream chunker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInput {
    pub course_id: String,
    pub material_id: String,
    pub content: String,
    pub chunk_index: u32,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Pre-computed embedding; when absent the store obtains one
    pub embedding: Option<Vec<f32>>,
}

/// A directed, typed edge between two nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    /// Deterministic id derived from (source, target, type)
    pub id: String,
    pub source_node_id: String,
    pub target_node_id: String,
    pub relationship_type: String,
    pub weight: f64,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Input record for relationship creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipInput {
    pub source_node_id: String,
    pub target_node_id: String,
    pub relationship_type: String,
    /// Defaults to 1.0 when absent
    pub weight: Option<f64>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl RelationshipInput {
    /// The deterministic id this input resolves to
    pub fn derived_id(&self) -> String {
        hashing::relationship_id(
            &self.source_node_id,
            &self.target_node_id,
            &self.relationship_type,
        )
    }
}

/// Options for semantic search
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchOptions {
    /// Restrict candidates to one material
    pub material_id: Option<String>,
    /// Restrict candidates to one course
    pub course_id: Option<String>,
    /// Maximum number of results (1..=100)
    pub limit: usize,
    /// Discard candidates scoring below this (0.0..=1.0)
    pub similarity_threshold: f32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            material_id: None,
            course_id: None,
            limit: 10,
            similarity_threshold: 0.0,
        }
    }
}

/// How a search result was scored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// Cosine similarity between query and node embeddings
    Vector,
    /// Keyword-overlap fallback (no embedding available)
    Keyword,
}

/// A single ranked search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub node: Node,
    pub similarity: f32,
    pub matched: MatchKind,
}

/// Full response for a semantic search call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Hits sorted by non-increasing similarity, ties by node id ascending
    pub results: Vec<SearchResult>,
    /// True when served from the query-result cache
    pub cached: bool,
    /// True when any scoring fell back to keyword overlap
    pub degraded: bool,
}

/// A node annotated with its incident relationships (both directions)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeWithRelationships {
    pub node: Node,
    pub relationships: Vec<Relationship>,
}

/// Outcome of a bulk node ingestion
///
/// Persistence is chunked; a storage failure mid-batch leaves earlier
/// chunks durably stored. `nodes` holds exactly what was persisted and
/// `failed` counts the inputs that were not.
#[derive(Debug, Clone)]
pub struct BatchStoreOutcome {
    /// Stored nodes, in input order, each with a distinct id
    pub nodes: Vec<Node>,
    /// How many stored nodes carry a fresh or carried-over embedding
    pub embedded: usize,
    /// How many stored nodes went in vector-less after provider failure
    pub degraded: usize,
    /// How many inputs were not persisted after a storage failure
    pub failed: usize,
}

/// Outcome of a material-graph deletion; idempotent, zero counts on repeat
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeleteReport {
    pub deleted_nodes: u64,
    pub deleted_relationships: u64,
}

/// Aggregate counts over the stored graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: u64,
    pub relationship_count: u64,
    /// Node count per material id
    pub materials: HashMap<String, u64>,
}

impl GraphStats {
    pub fn is_empty(&self) -> bool {
        self.node_count == 0 && self.relationship_count == 0
    }
}

/// Full export of the graph; the unit of backup and migration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<Node>,
    pub relationships: Vec<Relationship>,
    pub exported_at: DateTime<Utc>,
}
