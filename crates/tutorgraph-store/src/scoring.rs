//! Candidate ranking shared by both backends
//!
//! Keeping the ranking in one place is what makes the two `GraphStore`
//! implementations behave identically: the same code path scores,
//! thresholds, sorts, and truncates for either backend.

use tutorgraph_core::types::{MatchKind, Node, SearchOptions, SearchResult};
use tutorgraph_core::vector;

/// Score, threshold, sort, and truncate a candidate set
///
/// Cosine similarity when both the query and the candidate carry a
/// vector; keyword overlap otherwise. Ties in similarity break by node id
/// ascending so rankings are deterministic. Returns the ranked results
/// and whether any scoring fell back to keywords.
pub fn rank_candidates(
    query: &str,
    query_embedding: Option<&[f32]>,
    candidates: Vec<Node>,
    options: &SearchOptions,
) -> (Vec<SearchResult>, bool) {
    let mut degraded = query_embedding.is_none();
    let mut results: Vec<SearchResult> = Vec::new();

    for node in candidates {
        let (similarity, matched) = match (query_embedding, node.embedding.as_deref()) {
            (Some(q), Some(e)) => match vector::cosine_similarity(q, e) {
                Some(sim) => (sim, MatchKind::Vector),
                // Dimension mismatch or zero vector; score what we can
                None => {
                    degraded = true;
                    (
                        vector::keyword_overlap_score(query, &node.content),
                        MatchKind::Keyword,
                    )
                }
            },
            _ => {
                degraded = true;
                (
                    vector::keyword_overlap_score(query, &node.content),
                    MatchKind::Keyword,
                )
            }
        };

        if similarity >= options.similarity_threshold {
            results.push(SearchResult {
                node,
                similarity,
                matched,
            });
        }
    }

    results.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.node.id.cmp(&b.node.id))
    });
    results.truncate(options.limit);

    (results, degraded)
}
