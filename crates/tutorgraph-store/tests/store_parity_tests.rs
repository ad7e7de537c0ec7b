//! Behavioral parity between the in-memory and SQLite backends
//!
//! Every scenario runs against both `GraphStore` implementations; the
//! backends must be observably interchangeable.

use std::collections::HashMap;
use std::sync::Arc;

use tutorgraph_core::types::{NodeInput, RelationshipInput, SearchOptions};
use tutorgraph_core::{GraphError, GraphStore};
use tutorgraph_embeddings::{
    create_mock_service, EmbeddingConfig, EmbeddingService, MockEmbeddingProvider,
};
use tutorgraph_store::{MemoryGraphStore, SqliteGraphStore};

fn mock_service(dimensions: usize) -> Arc<EmbeddingService> {
    Arc::new(create_mock_service(dimensions))
}

/// Service whose provider always fails, with fast retries
fn failing_service() -> Arc<EmbeddingService> {
    let provider = Arc::new(MockEmbeddingProvider::with_dimensions(768).fail_always());
    let mut config = EmbeddingConfig::default();
    config.retry_base_delay_ms = 1;
    Arc::new(EmbeddingService::new(provider, config))
}

fn backends(embedder: Arc<EmbeddingService>) -> Vec<(&'static str, Arc<dyn GraphStore>)> {
    vec![
        (
            "memory",
            Arc::new(MemoryGraphStore::new(embedder.clone())) as Arc<dyn GraphStore>,
        ),
        (
            "sqlite",
            Arc::new(SqliteGraphStore::memory(embedder).expect("sqlite store")),
        ),
    ]
}

fn node_input(material: &str, content: &str, chunk: u32) -> NodeInput {
    NodeInput {
        course_id: "course-1".into(),
        material_id: material.into(),
        content: content.into(),
        chunk_index: chunk,
        metadata: HashMap::new(),
        embedding: None,
    }
}

fn relationship_input(source: &str, target: &str, weight: Option<f64>) -> RelationshipInput {
    RelationshipInput {
        source_node_id: source.into(),
        target_node_id: target.into(),
        relationship_type: "sequential".into(),
        weight,
        metadata: HashMap::new(),
    }
}

#[tokio::test]
async fn test_store_node_assigns_id_and_embedding() {
    for (name, store) in backends(mock_service(768)) {
        let node = store
            .store_node(node_input("mat-1", "gradient descent", 0))
            .await
            .unwrap();
        assert!(!node.id.is_empty(), "{name}");
        assert_eq!(node.embedding.as_ref().map(Vec::len), Some(768), "{name}");
        assert_eq!(node.material_id, "mat-1", "{name}");
    }
}

#[tokio::test]
async fn test_batch_store_distinct_ids() {
    for (name, store) in backends(mock_service(768)) {
        let inputs = vec![
            node_input("mat-1", "first chunk", 0),
            node_input("mat-1", "second chunk", 1),
            node_input("mat-1", "third chunk", 2),
        ];
        let outcome = store.store_batch_nodes(inputs).await.unwrap();
        assert_eq!(outcome.nodes.len(), 3, "{name}");
        assert_eq!(outcome.embedded, 3, "{name}");
        assert_eq!(outcome.degraded, 0, "{name}");
        assert_eq!(outcome.failed, 0, "{name}");

        let mut ids: Vec<&str> = outcome.nodes.iter().map(|n| n.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3, "{name}: ids must be distinct");

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.node_count, 3, "{name}");
    }
}

#[tokio::test]
async fn test_store_degrades_when_provider_is_down() {
    for (name, store) in backends(failing_service()) {
        let node = store
            .store_node(node_input("mat-1", "stored without a vector", 0))
            .await
            .unwrap();
        assert!(node.embedding.is_none(), "{name}");

        let outcome = store
            .store_batch_nodes(vec![
                node_input("mat-1", "batch one", 1),
                node_input("mat-1", "batch two", 2),
            ])
            .await
            .unwrap();
        assert_eq!(outcome.degraded, 2, "{name}");
        assert_eq!(outcome.embedded, 0, "{name}");
    }
}

#[tokio::test]
async fn test_keyword_search_ranks_by_overlap() {
    // Provider down end to end: nodes are stored vector-less and the
    // query is scored by keyword overlap
    for (name, store) in backends(failing_service()) {
        store
            .store_batch_nodes(vec![
                node_input(
                    "mat-1",
                    "Machine learning is a subset of artificial intelligence.",
                    0,
                ),
                node_input(
                    "mat-1",
                    "Deep learning uses neural networks with multiple layers.",
                    1,
                ),
                node_input(
                    "mat-1",
                    "Natural language processing helps computers understand text.",
                    2,
                ),
            ])
            .await
            .unwrap();

        let response = store
            .semantic_search("machine learning", &SearchOptions::default())
            .await
            .unwrap();
        assert!(response.degraded, "{name}");
        assert!(!response.results.is_empty(), "{name}");

        let top = &response.results[0];
        assert!(
            top.node.content.starts_with("Machine learning"),
            "{name}: got {:?}",
            top.node.content
        );
        assert!(top.similarity > 0.0, "{name}");
        for pair in response.results.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity, "{name}");
        }
    }
}

#[tokio::test]
async fn test_search_threshold_and_limit() {
    for (name, store) in backends(failing_service()) {
        store
            .store_batch_nodes(vec![
                node_input("mat-1", "machine learning overview", 0),
                node_input("mat-1", "machine learning in depth", 1),
                node_input("mat-1", "completely unrelated text", 2),
            ])
            .await
            .unwrap();

        let response = store
            .semantic_search(
                "machine learning",
                &SearchOptions {
                    similarity_threshold: 0.2,
                    limit: 1,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(response.results.len(), 1, "{name}");
        assert!(response.results[0].similarity >= 0.2, "{name}");
    }
}

#[tokio::test]
async fn test_search_filters_by_material_and_course() {
    for (name, store) in backends(failing_service()) {
        store
            .store_node(node_input("mat-1", "machine learning alpha", 0))
            .await
            .unwrap();
        store
            .store_node(node_input("mat-2", "machine learning beta", 0))
            .await
            .unwrap();

        let response = store
            .semantic_search(
                "machine learning",
                &SearchOptions {
                    material_id: Some("mat-2".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(response.results.len(), 1, "{name}");
        assert_eq!(response.results[0].node.material_id, "mat-2", "{name}");

        let none = store
            .semantic_search(
                "machine learning",
                &SearchOptions {
                    course_id: Some("course-unknown".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(none.results.is_empty(), "{name}");
    }
}

#[tokio::test]
async fn test_search_rejects_invalid_input() {
    for (name, store) in backends(mock_service(768)) {
        let err = store
            .semantic_search("   ", &SearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)), "{name}");

        let err = store
            .semantic_search(
                "fine query",
                &SearchOptions {
                    limit: 0,
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)), "{name}");
    }
}

#[tokio::test]
async fn test_relationship_upsert_keeps_identity() {
    for (name, store) in backends(mock_service(768)) {
        let a = store.store_node(node_input("mat-1", "node a", 0)).await.unwrap();
        let b = store.store_node(node_input("mat-1", "node b", 1)).await.unwrap();

        let first = store
            .store_relationship(relationship_input(&a.id, &b.id, None))
            .await
            .unwrap();
        assert_eq!(first.weight, 1.0, "{name}");

        let second = store
            .store_relationship(relationship_input(&a.id, &b.id, Some(0.5)))
            .await
            .unwrap();
        assert_eq!(second.id, first.id, "{name}");
        assert_eq!(second.weight, 0.5, "{name}");
        assert_eq!(second.created_at, first.created_at, "{name}");

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.relationship_count, 1, "{name}");
    }
}

#[tokio::test]
async fn test_relationship_requires_existing_endpoints() {
    for (name, store) in backends(mock_service(768)) {
        let a = store.store_node(node_input("mat-1", "only node", 0)).await.unwrap();
        let err = store
            .store_relationship(relationship_input(&a.id, "missing-node", None))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::NotFound(_)), "{name}");
    }
}

#[tokio::test]
async fn test_get_nodes_by_material_ordered_with_relationships() {
    for (name, store) in backends(mock_service(768)) {
        let second = store.store_node(node_input("mat-1", "chunk two", 1)).await.unwrap();
        let first = store.store_node(node_input("mat-1", "chunk one", 0)).await.unwrap();
        store.store_node(node_input("mat-other", "elsewhere", 0)).await.unwrap();
        store
            .store_relationship(relationship_input(&first.id, &second.id, None))
            .await
            .unwrap();

        let nodes = store.get_nodes_by_material("mat-1").await.unwrap();
        assert_eq!(nodes.len(), 2, "{name}");
        assert_eq!(nodes[0].node.chunk_index, 0, "{name}");
        assert_eq!(nodes[1].node.chunk_index, 1, "{name}");
        // Edge is incident to both endpoints
        assert_eq!(nodes[0].relationships.len(), 1, "{name}");
        assert_eq!(nodes[1].relationships.len(), 1, "{name}");
    }
}

#[tokio::test]
async fn test_delete_material_graph_is_idempotent() {
    for (name, store) in backends(mock_service(768)) {
        let a = store.store_node(node_input("mat-1", "doomed a", 0)).await.unwrap();
        let b = store.store_node(node_input("mat-1", "doomed b", 1)).await.unwrap();
        let survivor = store.store_node(node_input("mat-2", "survivor", 0)).await.unwrap();
        store
            .store_relationship(relationship_input(&a.id, &b.id, None))
            .await
            .unwrap();
        store
            .store_relationship(relationship_input(&b.id, &survivor.id, None))
            .await
            .unwrap();

        let report = store.delete_material_graph("mat-1").await.unwrap();
        assert_eq!(report.deleted_nodes, 2, "{name}");
        // Both edges touch a deleted node
        assert_eq!(report.deleted_relationships, 2, "{name}");

        let repeat = store.delete_material_graph("mat-1").await.unwrap();
        assert_eq!(repeat.deleted_nodes, 0, "{name}");
        assert_eq!(repeat.deleted_relationships, 0, "{name}");

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.node_count, 1, "{name}");
        assert_eq!(stats.relationship_count, 0, "{name}");
    }
}

#[tokio::test]
async fn test_cleanup_removes_unknown_materials() {
    for (name, store) in backends(mock_service(768)) {
        store.store_node(node_input("mat-live", "kept", 0)).await.unwrap();
        let orphan_a = store.store_node(node_input("mat-gone", "orphan a", 0)).await.unwrap();
        let orphan_b = store.store_node(node_input("mat-gone", "orphan b", 1)).await.unwrap();
        store
            .store_relationship(relationship_input(&orphan_a.id, &orphan_b.id, None))
            .await
            .unwrap();

        let removed = store
            .cleanup_orphaned_nodes(&["mat-live".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 3, "{name}: 2 nodes + 1 relationship");

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.node_count, 1, "{name}");
        assert!(stats.materials.contains_key("mat-live"), "{name}");
    }
}

#[tokio::test]
async fn test_export_round_trips_counts() {
    for (name, store) in backends(mock_service(768)) {
        let a = store.store_node(node_input("mat-1", "export a", 0)).await.unwrap();
        let b = store.store_node(node_input("mat-1", "export b", 1)).await.unwrap();
        store
            .store_relationship(relationship_input(&a.id, &b.id, Some(0.7)))
            .await
            .unwrap();

        let snapshot = store.export_graph().await.unwrap();
        assert_eq!(snapshot.nodes.len(), 2, "{name}");
        assert_eq!(snapshot.relationships.len(), 1, "{name}");
        assert!(
            snapshot.nodes.iter().all(|n| n.embedding.is_some()),
            "{name}"
        );
    }
}

#[tokio::test]
async fn test_sqlite_query_cache_hit_and_invalidation() {
    let store = SqliteGraphStore::memory(failing_service()).unwrap();
    store
        .store_node(node_input("mat-1", "machine learning basics", 0))
        .await
        .unwrap();

    let options = SearchOptions::default();
    let first = store.semantic_search("machine learning", &options).await.unwrap();
    assert!(!first.cached);

    let second = store.semantic_search("machine learning", &options).await.unwrap();
    assert!(second.cached);
    assert_eq!(second.results.len(), first.results.len());

    // Any write invalidates cached search results
    store
        .store_node(node_input("mat-1", "machine learning advanced", 1))
        .await
        .unwrap();
    let third = store.semantic_search("machine learning", &options).await.unwrap();
    assert!(!third.cached);
    assert_eq!(third.results.len(), 2);
}

#[tokio::test]
async fn test_sqlite_persists_across_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = tutorgraph_store::SqliteStoreConfig::new(dir.path().join("graph.db"));

    let id = {
        let store = SqliteGraphStore::new(config.clone(), mock_service(768)).unwrap();
        let node = store
            .store_node(node_input("mat-1", "durable content", 0))
            .await
            .unwrap();
        node.id
    };

    let reopened = SqliteGraphStore::new(config, mock_service(768)).unwrap();
    let nodes = reopened.get_nodes_by_material("mat-1").await.unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].node.id, id);
    assert_eq!(nodes[0].node.embedding.as_ref().map(Vec::len), Some(768));
}
