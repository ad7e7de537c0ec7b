//! `GraphStore` implementation over SQLite
//!
//! Candidate filtering is pushed into parameterized SQL; similarity
//! scoring runs through the shared helpers over the filtered rows.
//! No value is ever interpolated into SQL text. Writes invalidate the
//! query-result cache so cached searches never outlive a mutation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use tutorgraph_core::types::{
    BatchStoreOutcome, DeleteReport, GraphSnapshot, GraphStats, Node, NodeInput,
    NodeWithRelationships, Relationship, RelationshipInput, SearchOptions, SearchResponse,
};
use tutorgraph_core::{validate, GraphError, GraphResult, GraphStore};
use tutorgraph_embeddings::EmbeddingService;

use super::error::{SqliteError, SqliteResult};
use super::query_cache::QueryCache;
use super::{SqlitePool, SqliteStoreConfig};
use crate::embed;
use crate::scoring;
use crate::BATCH_CHUNK_SIZE;

const NODE_COLUMNS: &str =
    "id, course_id, material_id, content, chunk_index, metadata, embedding, created_at, updated_at";
const RELATIONSHIP_COLUMNS: &str =
    "id, source_node_id, target_node_id, relationship_type, weight, metadata, created_at";

/// Persistent `GraphStore` backed by SQLite
pub struct SqliteGraphStore {
    pool: SqlitePool,
    embedder: Arc<EmbeddingService>,
    query_cache: QueryCache,
}

impl SqliteGraphStore {
    /// Open (or create) the database and apply schema migrations
    pub fn new(config: SqliteStoreConfig, embedder: Arc<EmbeddingService>) -> GraphResult<Self> {
        let query_cache = QueryCache::new(config.cache.clone());
        let pool = SqlitePool::new(config)?;
        Ok(Self {
            pool,
            embedder,
            query_cache,
        })
    }

    /// In-memory instance for testing
    pub fn memory(embedder: Arc<EmbeddingService>) -> GraphResult<Self> {
        Self::new(SqliteStoreConfig::memory(), embedder)
    }

    fn insert_node(conn: &Connection, node: &Node) -> SqliteResult<()> {
        let metadata = serde_json::to_string(&node.metadata)
            .map_err(|e| SqliteError::Serialization(e.to_string()))?;
        conn.execute(
            "INSERT INTO nodes (id, course_id, material_id, content, chunk_index, metadata, embedding, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                node.id,
                node.course_id,
                node.material_id,
                node.content,
                node.chunk_index,
                metadata,
                node.embedding.as_deref().map(vec_to_blob),
                node.created_at.to_rfc3339(),
                node.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn load_nodes(
        conn: &Connection,
        sql: &str,
        parameters: &[String],
    ) -> SqliteResult<Vec<Node>> {
        let mut stmt = conn.prepare(sql)?;
        let raw_rows: Vec<RawNode> = stmt
            .query_map(params_from_iter(parameters.iter()), RawNode::from_row)?
            .collect::<Result<_, _>>()?;
        raw_rows.into_iter().map(RawNode::into_node).collect()
    }

    fn load_relationships(
        conn: &Connection,
        sql: &str,
        parameters: &[String],
    ) -> SqliteResult<Vec<Relationship>> {
        let mut stmt = conn.prepare(sql)?;
        let raw_rows: Vec<RawRelationship> = stmt
            .query_map(params_from_iter(parameters.iter()), RawRelationship::from_row)?
            .collect::<Result<_, _>>()?;
        raw_rows
            .into_iter()
            .map(RawRelationship::into_relationship)
            .collect()
    }

    fn node_exists(conn: &Connection, id: &str) -> SqliteResult<bool> {
        let found: Option<i64> = conn
            .query_row("SELECT 1 FROM nodes WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }
}

/// Encode an embedding as a little-endian f32 blob
fn vec_to_blob(v: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(v.len() * 4);
    for value in v {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

/// Decode a little-endian f32 blob back into an embedding
fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn parse_timestamp(value: &str, field: &str) -> SqliteResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SqliteError::Serialization(format!("invalid {field} timestamp: {e}")))
}

fn parse_metadata(value: &str) -> SqliteResult<HashMap<String, serde_json::Value>> {
    serde_json::from_str(value).map_err(|e| SqliteError::Serialization(e.to_string()))
}

/// Row image of a node before type conversion
struct RawNode {
    id: String,
    course_id: String,
    material_id: String,
    content: String,
    chunk_index: u32,
    metadata: String,
    embedding: Option<Vec<u8>>,
    created_at: String,
    updated_at: String,
}

impl RawNode {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            course_id: row.get(1)?,
            material_id: row.get(2)?,
            content: row.get(3)?,
            chunk_index: row.get(4)?,
            metadata: row.get(5)?,
            embedding: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_node(self) -> SqliteResult<Node> {
        Ok(Node {
            created_at: parse_timestamp(&self.created_at, "created_at")?,
            updated_at: parse_timestamp(&self.updated_at, "updated_at")?,
            metadata: parse_metadata(&self.metadata)?,
            embedding: self.embedding.as_deref().map(blob_to_vec),
            id: self.id,
            course_id: self.course_id,
            material_id: self.material_id,
            content: self.content,
            chunk_index: self.chunk_index,
        })
    }
}

/// Row image of a relationship before type conversion
struct RawRelationship {
    id: String,
    source_node_id: String,
    target_node_id: String,
    relationship_type: String,
    weight: f64,
    metadata: String,
    created_at: String,
}

impl RawRelationship {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            source_node_id: row.get(1)?,
            target_node_id: row.get(2)?,
            relationship_type: row.get(3)?,
            weight: row.get(4)?,
            metadata: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn into_relationship(self) -> SqliteResult<Relationship> {
        Ok(Relationship {
            created_at: parse_timestamp(&self.created_at, "created_at")?,
            metadata: parse_metadata(&self.metadata)?,
            id: self.id,
            source_node_id: self.source_node_id,
            target_node_id: self.target_node_id,
            relationship_type: self.relationship_type,
            weight: self.weight,
        })
    }
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    async fn store_node(&self, mut input: NodeInput) -> GraphResult<Node> {
        validate::validate_node_input(&mut input)?;
        let (embedding, degraded) = embed::resolve_embedding(&self.embedder, &input).await?;
        let node = embed::build_node(input, embedding);
        if degraded {
            debug!(node_id = %node.id, "Storing node without embedding");
        }

        self.pool
            .with_connection(|conn| Self::insert_node(conn, &node))?;
        self.query_cache.clear();
        Ok(node)
    }

    async fn store_batch_nodes(&self, inputs: Vec<NodeInput>) -> GraphResult<BatchStoreOutcome> {
        let mut validated = Vec::with_capacity(inputs.len());
        for mut input in inputs {
            validate::validate_node_input(&mut input)?;
            validated.push(input);
        }

        let embeddings = embed::resolve_batch_embeddings(&self.embedder, &validated).await?;

        let mut outcome = BatchStoreOutcome {
            nodes: Vec::with_capacity(validated.len()),
            embedded: 0,
            degraded: 0,
            failed: 0,
        };
        let paired: Vec<(NodeInput, Option<Vec<f32>>)> =
            validated.into_iter().zip(embeddings).collect();

        // One transaction per chunk. A chunk that fails to commit stops
        // the batch; the committed prefix stays visible in the outcome
        // and the unpersisted remainder is counted, not discarded.
        let mut remaining = paired.len();
        for chunk in paired.chunks(BATCH_CHUNK_SIZE) {
            let chunk_nodes: Vec<Node> = chunk
                .iter()
                .cloned()
                .map(|(input, embedding)| embed::build_node(input, embedding))
                .collect();

            let persisted = self.pool.with_connection_mut(|conn| {
                let tx = conn.transaction()?;
                for node in &chunk_nodes {
                    Self::insert_node(&tx, node)?;
                }
                tx.commit()?;
                Ok(())
            });
            if let Err(err) = persisted {
                let err: GraphError = err.into();
                tutorgraph_core::recovery::classify(
                    tutorgraph_core::recovery::FailureContext::Store,
                    &err,
                );
                warn!(
                    %err,
                    stored = outcome.nodes.len(),
                    failed = remaining,
                    "Batch persistence stopped mid-way"
                );
                outcome.failed = remaining;
                break;
            }

            remaining -= chunk_nodes.len();
            for node in chunk_nodes {
                if node.embedding.is_some() {
                    outcome.embedded += 1;
                } else {
                    outcome.degraded += 1;
                }
                outcome.nodes.push(node);
            }
        }

        self.query_cache.clear();
        Ok(outcome)
    }

    async fn store_relationship(&self, mut input: RelationshipInput) -> GraphResult<Relationship> {
        validate::validate_relationship_input(&mut input)?;
        let id = input.derived_id();
        let metadata = serde_json::to_string(&input.metadata)
            .map_err(|e| GraphError::Serialization(e.to_string()))?;

        let relationship = self.pool.with_connection(|conn| {
            if !Self::node_exists(conn, &input.source_node_id)? {
                return Err(SqliteError::NotFound(format!(
                    "source node {}",
                    input.source_node_id
                )));
            }
            if !Self::node_exists(conn, &input.target_node_id)? {
                return Err(SqliteError::NotFound(format!(
                    "target node {}",
                    input.target_node_id
                )));
            }

            // Upsert by identity triple: refresh weight/metadata, keep created_at
            conn.execute(
                "INSERT INTO relationships (id, source_node_id, target_node_id, relationship_type, weight, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(source_node_id, target_node_id, relationship_type)
                 DO UPDATE SET weight = COALESCE(?8, relationships.weight), metadata = excluded.metadata",
                params![
                    id,
                    input.source_node_id,
                    input.target_node_id,
                    input.relationship_type,
                    input.weight.unwrap_or(1.0),
                    metadata,
                    Utc::now().to_rfc3339(),
                    input.weight,
                ],
            )?;

            let mut rows = Self::load_relationships(
                conn,
                &format!("SELECT {RELATIONSHIP_COLUMNS} FROM relationships WHERE id = ?1"),
                &[id.clone()],
            )?;
            rows.pop()
                .ok_or_else(|| SqliteError::NotFound(format!("relationship {id}")))
        })?;

        self.query_cache.clear();
        Ok(relationship)
    }

    async fn semantic_search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> GraphResult<SearchResponse> {
        let query = validate::validate_query(query)?;
        validate::validate_search_options(options)?;

        let cache_key = QueryCache::key_for(&query, options);
        if let Some(hit) = self.query_cache.get(&cache_key) {
            return Ok(hit);
        }

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

        // Filter pushdown; scoring happens over the narrowed rows
        let mut sql = format!("SELECT {NODE_COLUMNS} FROM nodes");
        let mut clauses: Vec<&str> = Vec::new();
        let mut parameters: Vec<String> = Vec::new();
        if let Some(material_id) = &options.material_id {
            clauses.push("material_id = ?");
            parameters.push(material_id.clone());
        }
        if let Some(course_id) = &options.course_id {
            clauses.push("course_id = ?");
            parameters.push(course_id.clone());
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        let candidates = self
            .pool
            .with_connection(|conn| Self::load_nodes(conn, &sql, &parameters))?;

        let (results, degraded) =
            scoring::rank_candidates(&query, query_embedding.as_deref(), candidates, options);
        let response = SearchResponse {
            results,
            cached: false,
            degraded,
        };
        self.query_cache.insert(cache_key, response.clone());
        Ok(response)
    }

    async fn get_nodes_by_material(
        &self,
        material_id: &str,
    ) -> GraphResult<Vec<NodeWithRelationships>> {
        let material_id = validate::validate_id(material_id, "material_id")?;

        let annotated = self.pool.with_connection(|conn| {
            let nodes = Self::load_nodes(
                conn,
                &format!(
                    "SELECT {NODE_COLUMNS} FROM nodes WHERE material_id = ?1 \
                     ORDER BY chunk_index ASC, id ASC"
                ),
                &[material_id.clone()],
            )?;

            nodes
                .into_iter()
                .map(|node| {
                    let relationships = Self::load_relationships(
                        conn,
                        &format!(
                            "SELECT {RELATIONSHIP_COLUMNS} FROM relationships \
                             WHERE source_node_id = ?1 OR target_node_id = ?2"
                        ),
                        &[node.id.clone(), node.id.clone()],
                    )?;
                    Ok(NodeWithRelationships {
                        node,
                        relationships,
                    })
                })
                .collect::<SqliteResult<Vec<_>>>()
        })?;

        Ok(annotated)
    }

    async fn delete_material_graph(&self, material_id: &str) -> GraphResult<DeleteReport> {
        let material_id = validate::validate_id(material_id, "material_id")?;

        let report = self.pool.with_connection_mut(|conn| {
            let tx = conn.transaction()?;

            let deleted_relationships: u64 = tx.query_row(
                "SELECT COUNT(*) FROM relationships
                 WHERE source_node_id IN (SELECT id FROM nodes WHERE material_id = ?1)
                    OR target_node_id IN (SELECT id FROM nodes WHERE material_id = ?1)",
                params![material_id],
                |row| row.get::<_, i64>(0),
            )? as u64;

            // Foreign keys cascade the relationship rows
            let deleted_nodes =
                tx.execute("DELETE FROM nodes WHERE material_id = ?1", params![material_id])?
                    as u64;

            tx.commit()?;
            Ok(DeleteReport {
                deleted_nodes,
                deleted_relationships,
            })
        })?;

        self.query_cache.clear();
        info!(%material_id, deleted_nodes = report.deleted_nodes, deleted_relationships = report.deleted_relationships, "Deleted material graph");
        Ok(report)
    }

    async fn cleanup_orphaned_nodes(&self, known_materials: &[String]) -> GraphResult<u64> {
        let removed = self.pool.with_connection_mut(|conn| {
            let tx = conn.transaction()?;

            let placeholders = vec!["?"; known_materials.len()].join(", ");
            let (node_filter, relationship_count_sql) = if known_materials.is_empty() {
                (
                    "DELETE FROM nodes".to_string(),
                    "SELECT COUNT(*) FROM relationships".to_string(),
                )
            } else {
                (
                    format!("DELETE FROM nodes WHERE material_id NOT IN ({placeholders})"),
                    format!(
                        "SELECT COUNT(*) FROM relationships
                         WHERE source_node_id IN (SELECT id FROM nodes WHERE material_id NOT IN ({placeholders}))
                            OR target_node_id IN (SELECT id FROM nodes WHERE material_id NOT IN ({placeholders}))"
                    ),
                )
            };

            let mut count_params: Vec<String> = known_materials.to_vec();
            count_params.extend(known_materials.to_vec());
            let dangling: u64 = tx.query_row(
                &relationship_count_sql,
                params_from_iter(count_params.iter()),
                |row| row.get::<_, i64>(0),
            )? as u64;

            let orphaned =
                tx.execute(&node_filter, params_from_iter(known_materials.iter()))? as u64;

            tx.commit()?;
            Ok(orphaned + dangling)
        })?;

        self.query_cache.clear();
        if removed > 0 {
            info!(removed, "Cleaned up orphaned graph records");
        }
        Ok(removed)
    }

    async fn stats(&self) -> GraphResult<GraphStats> {
        let stats = self.pool.with_connection(|conn| {
            let node_count: i64 =
                conn.query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))?;
            let relationship_count: i64 =
                conn.query_row("SELECT COUNT(*) FROM relationships", [], |row| row.get(0))?;

            let mut stmt =
                conn.prepare("SELECT material_id, COUNT(*) FROM nodes GROUP BY material_id")?;
            let materials: HashMap<String, u64> = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
                })?
                .collect::<Result<_, _>>()?;

            Ok(GraphStats {
                node_count: node_count as u64,
                relationship_count: relationship_count as u64,
                materials,
            })
        })?;
        Ok(stats)
    }

    async fn export_graph(&self) -> GraphResult<GraphSnapshot> {
        let snapshot = self.pool.with_connection(|conn| {
            let nodes = Self::load_nodes(
                conn,
                &format!("SELECT {NODE_COLUMNS} FROM nodes ORDER BY id"),
                &[],
            )?;
            let relationships = Self::load_relationships(
                conn,
                &format!("SELECT {RELATIONSHIP_COLUMNS} FROM relationships ORDER BY id"),
                &[],
            )?;
            Ok(GraphSnapshot {
                nodes,
                relationships,
                exported_at: Utc::now(),
            })
        })?;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutorgraph_embeddings::create_mock_service;

    #[tokio::test]
    async fn test_batch_surfaces_durable_prefix_on_storage_failure() {
        let store = SqliteGraphStore::memory(Arc::new(create_mock_service(768))).unwrap();
        // Cap the table so the second chunk's transaction aborts
        store
            .pool
            .with_connection(|conn| {
                conn.execute_batch(
                    "CREATE TRIGGER node_cap BEFORE INSERT ON nodes
                     WHEN (SELECT COUNT(*) FROM nodes) >= 60
                     BEGIN SELECT RAISE(ABORT, 'node cap reached'); END;",
                )?;
                Ok(())
            })
            .unwrap();

        let inputs: Vec<NodeInput> = (0..75u32)
            .map(|i| NodeInput {
                course_id: "course-1".into(),
                material_id: "mat-1".into(),
                content: format!("chunk number {i}"),
                chunk_index: i,
                metadata: HashMap::new(),
                embedding: None,
            })
            .collect();

        let outcome = store.store_batch_nodes(inputs).await.unwrap();
        assert_eq!(outcome.nodes.len(), BATCH_CHUNK_SIZE);
        assert_eq!(outcome.failed, 25);
        assert_eq!(outcome.embedded, BATCH_CHUNK_SIZE);
        assert_eq!(outcome.degraded, 0);

        // The committed prefix really is durable
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.node_count, BATCH_CHUNK_SIZE as u64);
    }

    #[test]
    fn test_blob_round_trip() {
        let v = vec![0.25f32, -1.5, 3.75, 0.0];
        assert_eq!(blob_to_vec(&vec_to_blob(&v)), v);
    }

    #[test]
    fn test_blob_empty() {
        assert!(blob_to_vec(&vec_to_blob(&[])).is_empty());
    }
}
