//! Embedding acquisition shared by both backends
//!
//! Both stores degrade the same way: a transient provider failure stores
//! the node without a vector, while quota exhaustion and auth rejection
//! surface to the caller per the recovery classifier.

use chrono::Utc;
use tracing::warn;
use tutorgraph_core::recovery::{self, FailureContext, FallbackMode, Recovery};
use tutorgraph_core::types::{Node, NodeInput};
use tutorgraph_core::{GraphError, GraphResult};
use tutorgraph_embeddings::EmbeddingService;
use uuid::Uuid;

/// Obtain an embedding for one node input, degrading on provider failure
///
/// Returns the vector (or `None` in degraded mode) and whether the
/// degraded path was taken.
pub(crate) async fn resolve_embedding(
    embedder: &EmbeddingService,
    input: &NodeInput,
) -> GraphResult<(Option<Vec<f32>>, bool)> {
    if let Some(embedding) = &input.embedding {
        return Ok((Some(embedding.clone()), false));
    }
    match embedder.generate(&input.content).await {
        Ok(outcome) => Ok((Some(outcome.embedding), false)),
        Err(err) => {
            let err: GraphError = err.into();
            match recovery::classify(FailureContext::Store, &err) {
                Recovery::Fallback(FallbackMode::StoreWithoutEmbedding) => Ok((None, true)),
                Recovery::Retry { .. } | Recovery::Continue => Ok((None, true)),
                _ => Err(err),
            }
        }
    }
}

/// Obtain embeddings for a whole batch in one provider call
///
/// Inputs that already carry a vector keep it. Per-item provider
/// failures yield `None` (stored vector-less); a fatal failure (quota,
/// auth) aborts the batch before anything is persisted.
pub(crate) async fn resolve_batch_embeddings(
    embedder: &EmbeddingService,
    inputs: &[NodeInput],
) -> GraphResult<Vec<Option<Vec<f32>>>> {
    let mut resolved: Vec<Option<Vec<f32>>> = inputs
        .iter()
        .map(|input| input.embedding.clone())
        .collect();

    let missing: Vec<(usize, String)> = inputs
        .iter()
        .enumerate()
        .filter(|(_, input)| input.embedding.is_none())
        .map(|(i, input)| (i, input.content.clone()))
        .collect();
    if missing.is_empty() {
        return Ok(resolved);
    }

    let texts: Vec<String> = missing.iter().map(|(_, t)| t.clone()).collect();
    match embedder.generate_batch(&texts).await {
        Ok(outcome) => {
            for ((i, _), embedding) in missing.iter().zip(outcome.embeddings) {
                resolved[*i] = embedding;
            }
            Ok(resolved)
        }
        Err(err) => {
            let err: GraphError = err.into();
            match recovery::classify(FailureContext::Store, &err) {
                Recovery::Fatal => Err(err),
                _ => {
                    warn!(%err, "Batch embedding unavailable, storing nodes without vectors");
                    Ok(resolved)
                }
            }
        }
    }
}

/// Materialize a node from validated input and a resolved embedding
pub(crate) fn build_node(input: NodeInput, embedding: Option<Vec<f32>>) -> Node {
    let now = Utc::now();
    Node {
        id: Uuid::new_v4().to_string(),
        course_id: input.course_id,
        material_id: input.material_id,
        content: input.content,
        chunk_index: input.chunk_index,
        metadata: input.metadata,
        embedding,
        created_at: now,
        updated_at: now,
    }
}
