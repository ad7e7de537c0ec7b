//! Vector scoring helpers shared by both storage backends
//!
//! Cosine similarity for embedded candidates, keyword overlap for the
//! degraded path when the embedding provider is unavailable. Both return
//! scores comparable within a single result set.

/// Embedding dimensionalities the subsystem accepts
pub const SUPPORTED_DIMENSIONS: [usize; 4] = [512, 768, 1536, 3072];

/// Whether a vector length is one of the supported dimensionalities
pub fn is_supported_dimension(dimension: usize) -> bool {
    SUPPORTED_DIMENSIONS.contains(&dimension)
}

/// Cosine similarity of two vectors
///
/// Returns `None` when the dimensions differ or either vector has zero
/// magnitude, so callers can fall back instead of comparing garbage.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Keyword-overlap score in [0, 1]
///
/// Term frequency weighted by term length relative to content length:
/// each query term contributes occurrences times term length, the sum is
/// divided by the content length and capped at 1.0. Case-insensitive.
/// Single-character terms are ignored as noise.
pub fn keyword_overlap_score(query: &str, content: &str) -> f32 {
    let content_lower = content.to_lowercase();
    if content_lower.is_empty() {
        return 0.0;
    }
    let mut raw = 0.0f32;
    for term in query.to_lowercase().split_whitespace() {
        if term.len() < 2 {
            continue;
        }
        let count = content_lower.matches(term).count();
        raw += (count * term.len()) as f32;
    }
    (raw / content_lower.len() as f32).min(1.0)
}
