//! `KnowledgeGraph` facade: rate limiting in front of a backend

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tutorgraph_core::limiter::{OperationClass, RateLimitConfig, RateLimiter, WindowLimit};
use tutorgraph_core::types::{NodeInput, SearchOptions};
use tutorgraph_core::GraphError;
use tutorgraph_embeddings::create_mock_service;
use tutorgraph_store::{KnowledgeGraph, MemoryGraphStore};

fn graph_with_limits(search_max: u32, ingest_max: u32) -> KnowledgeGraph {
    let embedder = Arc::new(create_mock_service(768));
    let store = Arc::new(MemoryGraphStore::new(embedder));
    let limit = |max| WindowLimit {
        max_requests: max,
        window: Duration::from_secs(60),
    };
    let limiter = Arc::new(RateLimiter::new(RateLimitConfig {
        search: limit(search_max),
        ingest: limit(ingest_max),
        embedding: limit(100),
    }));
    KnowledgeGraph::new(store, limiter)
}

fn node_input(content: &str, chunk: u32) -> NodeInput {
    NodeInput {
        course_id: "course-1".into(),
        material_id: "mat-1".into(),
        content: content.into(),
        chunk_index: chunk,
        metadata: HashMap::new(),
        embedding: None,
    }
}

#[tokio::test]
async fn test_search_budget_enforced_per_caller() {
    let graph = graph_with_limits(2, 100);
    graph
        .store_node("ingest", node_input("searchable content", 0))
        .await
        .unwrap();

    let options = SearchOptions::default();
    graph.semantic_search("alice", "content", &options).await.unwrap();
    graph.semantic_search("alice", "content", &options).await.unwrap();

    let err = graph
        .semantic_search("alice", "content", &options)
        .await
        .unwrap_err();
    match err {
        GraphError::RateLimited { retry_after } => {
            assert!(retry_after <= Duration::from_secs(60));
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }

    // A different caller still has budget
    graph.semantic_search("bob", "content", &options).await.unwrap();
}

#[tokio::test]
async fn test_write_budget_separate_from_search() {
    let graph = graph_with_limits(1, 2);

    graph.store_node("alice", node_input("one", 0)).await.unwrap();
    graph.store_node("alice", node_input("two", 1)).await.unwrap();
    let err = graph
        .store_node("alice", node_input("three", 2))
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::RateLimited { .. }));

    // Ingest exhaustion leaves the search budget untouched
    graph
        .semantic_search("alice", "one", &SearchOptions::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_rejected_requests_do_not_consume_budget() {
    let graph = graph_with_limits(2, 100);
    let options = SearchOptions::default();

    graph.semantic_search("alice", "query", &options).await.unwrap();
    graph.semantic_search("alice", "query", &options).await.unwrap();
    for _ in 0..3 {
        assert!(graph
            .semantic_search("alice", "query", &options)
            .await
            .is_err());
    }

    let usage = graph.usage("alice", OperationClass::Search);
    assert_eq!(usage.used, 2);
    assert_eq!(usage.remaining, 0);
}

#[tokio::test]
async fn test_reset_restores_budget() {
    let graph = graph_with_limits(1, 100);
    let options = SearchOptions::default();

    graph.semantic_search("alice", "query", &options).await.unwrap();
    assert!(graph.semantic_search("alice", "query", &options).await.is_err());

    graph.reset_limits("alice");
    graph.semantic_search("alice", "query", &options).await.unwrap();
}

#[tokio::test]
async fn test_validation_errors_pass_through() {
    let graph = graph_with_limits(10, 10);
    let err = graph
        .store_node("alice", node_input("", 0))
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::Validation(_)));
}

#[tokio::test]
async fn test_invalid_caller_id_rejected() {
    let graph = graph_with_limits(10, 10);
    let options = SearchOptions::default();

    for caller in ["", "   ", "al\x00ice"] {
        let err = graph
            .semantic_search(caller, "query", &options)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)), "caller {caller:?}");

        let err = graph.store_node(caller, node_input("content", 0)).await.unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)), "caller {caller:?}");
    }

    // The limiter never saw the raw strings as keys
    let usage = graph.usage("", OperationClass::Search);
    assert_eq!(usage.used, 0);

    // A caller id with surrounding whitespace is trimmed, not duplicated
    graph.semantic_search("  alice  ", "query", &options).await.unwrap();
    assert_eq!(graph.usage("alice", OperationClass::Search).used, 1);
}

#[tokio::test]
async fn test_admin_surfaces_unthrottled() {
    let graph = graph_with_limits(1, 1);
    graph.store_node("alice", node_input("content", 0)).await.unwrap();

    // stats/export stay available after both budgets are spent
    assert!(graph.store_node("alice", node_input("more", 1)).await.is_err());
    let stats = graph.stats().await.unwrap();
    assert_eq!(stats.node_count, 1);
    let snapshot = graph.export_graph().await.unwrap();
    assert_eq!(snapshot.nodes.len(), 1);
}
