//! Integration tests for the OpenAI-compatible HTTP provider
//!
//! Uses wiremock so no live endpoint is required. Covers response
//! parsing, auth propagation, status-code classification, and the retry
//! behavior of the service layer on top.

use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tutorgraph_embeddings::{
    EmbeddingConfig, EmbeddingError, EmbeddingProvider, EmbeddingService, HttpEmbeddingProvider,
};

fn config_for(server: &MockServer) -> EmbeddingConfig {
    let mut config = EmbeddingConfig::local(server.uri(), "test-model".into(), 512);
    config.api_key = Some("sk-test-key".into());
    config.retry_base_delay_ms = 1;
    config
}

fn embedding_body(count: usize) -> serde_json::Value {
    let data: Vec<serde_json::Value> = (0..count)
        .map(|i| {
            json!({
                "embedding": vec![0.1f32; 512],
                "index": i,
            })
        })
        .collect();
    json!({
        "data": data,
        "model": "test-model",
        "usage": { "prompt_tokens": 8, "total_tokens": 8 }
    })
}

#[tokio::test]
async fn test_embed_parses_response_and_sends_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(header("authorization", "Bearer sk-test-key"))
        .and(body_partial_json(json!({ "model": "test-model" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(embedding_body(1)))
        .expect(1)
        .mount(&server)
        .await;

    let provider = HttpEmbeddingProvider::new(config_for(&server)).unwrap();
    let response = provider.embed("hello world").await.unwrap();

    assert_eq!(response.embedding.len(), 512);
    assert_eq!(response.model, "test-model");
    assert_eq!(response.tokens, Some(8));
}

#[tokio::test]
async fn test_embed_batch_aligned_with_input() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(embedding_body(3)))
        .mount(&server)
        .await;

    let provider = HttpEmbeddingProvider::new(config_for(&server)).unwrap();
    let responses = provider
        .embed_batch(vec!["a".into(), "b".into(), "c".into()])
        .await
        .unwrap();

    assert_eq!(responses.len(), 3);
    for response in responses {
        assert_eq!(response.dimensions, 512);
    }
}

#[tokio::test]
async fn test_unauthorized_maps_to_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let provider = HttpEmbeddingProvider::new(config_for(&server)).unwrap();
    let err = provider.embed("hello").await.unwrap_err();
    assert!(matches!(err, EmbeddingError::AuthError(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_throttling_maps_to_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let provider = HttpEmbeddingProvider::new(config_for(&server)).unwrap();
    let err = provider.embed("hello").await.unwrap_err();
    assert!(matches!(err, EmbeddingError::RateLimited(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_count_mismatch_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(embedding_body(1)))
        .mount(&server)
        .await;

    let provider = HttpEmbeddingProvider::new(config_for(&server)).unwrap();
    let err = provider
        .embed_batch(vec!["a".into(), "b".into()])
        .await
        .unwrap_err();
    assert!(matches!(err, EmbeddingError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_service_retries_transient_server_errors() {
    let server = MockServer::start().await;
    // Two failures, then success; the service's retry loop should absorb them
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(embedding_body(1)))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let provider = Arc::new(HttpEmbeddingProvider::new(config.clone()).unwrap());
    let service = EmbeddingService::new(provider, config);

    let outcome = service.generate("retry me").await.unwrap();
    assert_eq!(outcome.embedding.len(), 512);
    assert!(!outcome.cached);
}

#[tokio::test]
async fn test_service_does_not_retry_auth_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let provider = Arc::new(HttpEmbeddingProvider::new(config.clone()).unwrap());
    let service = EmbeddingService::new(provider, config);

    let err = service.generate("hello").await.unwrap_err();
    assert!(matches!(err, EmbeddingError::AuthError(_)));
}
