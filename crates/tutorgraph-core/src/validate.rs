//! Input validation and sanitization
//!
//! Every identifier, free-text string, and option set crossing the
//! subsystem boundary passes through here before reaching the rate
//! limiter, the embedding layer, or a storage backend. Pure functions,
//! no I/O; failures are `GraphError::Validation` and are never retried.

use crate::error::{GraphError, GraphResult};
use crate::types::{NodeInput, RelationshipInput, SearchOptions};
use crate::vector;

/// Maximum length in characters for identifiers (material/course/caller ids)
pub const MAX_ID_LENGTH: usize = 256;

/// Maximum length in characters for node content, matching the embedding
/// input cap
pub const MAX_CONTENT_LENGTH: usize = 100_000;

/// Maximum length in characters for a search query
pub const MAX_QUERY_LENGTH: usize = 1_000;

/// Maximum number of results a single search may request
pub const MAX_SEARCH_LIMIT: usize = 100;

/// Validate an externally supplied identifier
///
/// Trimmed, non-empty, bounded, and free of control characters. Returns
/// the trimmed value.
pub fn validate_id(value: &str, field: &str) -> GraphResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(GraphError::Validation(format!("{field} must not be empty")));
    }
    if trimmed.chars().count() > MAX_ID_LENGTH {
        return Err(GraphError::Validation(format!(
            "{field} exceeds {MAX_ID_LENGTH} characters"
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(GraphError::Validation(format!(
            "{field} contains control characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Sanitize free text: trim, strip control characters except newline/tab
///
/// Returns the cleaned text or a validation error when it is empty after
/// trimming or exceeds `max_len`.
pub fn sanitize_text(value: &str, field: &str, max_len: usize) -> GraphResult<String> {
    let cleaned: String = value
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        return Err(GraphError::Validation(format!("{field} must not be empty")));
    }
    if trimmed.chars().count() > max_len {
        return Err(GraphError::Validation(format!(
            "{field} exceeds {max_len} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Validate and sanitize a node input record in place
pub fn validate_node_input(input: &mut NodeInput) -> GraphResult<()> {
    input.course_id = validate_id(&input.course_id, "course_id")?;
    input.material_id = validate_id(&input.material_id, "material_id")?;
    input.content = sanitize_text(&input.content, "content", MAX_CONTENT_LENGTH)?;
    if let Some(embedding) = &input.embedding {
        if !vector::is_supported_dimension(embedding.len()) {
            return Err(GraphError::Validation(format!(
                "embedding dimension {} is not supported",
                embedding.len()
            )));
        }
    }
    Ok(())
}

/// Validate a relationship input record
pub fn validate_relationship_input(input: &mut RelationshipInput) -> GraphResult<()> {
    input.source_node_id = validate_id(&input.source_node_id, "source_node_id")?;
    input.target_node_id = validate_id(&input.target_node_id, "target_node_id")?;
    input.relationship_type = validate_id(&input.relationship_type, "relationship_type")?;
    if let Some(weight) = input.weight {
        if !weight.is_finite() || weight < 0.0 {
            return Err(GraphError::Validation(
                "weight must be a finite non-negative number".into(),
            ));
        }
    }
    Ok(())
}

/// Validate a search query string, returning the sanitized query
pub fn validate_query(query: &str) -> GraphResult<String> {
    sanitize_text(query, "query", MAX_QUERY_LENGTH)
}

/// Range- and type-check search options
pub fn validate_search_options(options: &SearchOptions) -> GraphResult<()> {
    if options.limit == 0 || options.limit > MAX_SEARCH_LIMIT {
        return Err(GraphError::Validation(format!(
            "limit must be between 1 and {MAX_SEARCH_LIMIT}"
        )));
    }
    if !(0.0..=1.0).contains(&options.similarity_threshold) {
        return Err(GraphError::Validation(
            "similarity_threshold must be between 0.0 and 1.0".into(),
        ));
    }
    if let Some(material_id) = &options.material_id {
        validate_id(material_id, "material_id")?;
    }
    if let Some(course_id) = &options.course_id {
        validate_id(course_id, "course_id")?;
    }
    Ok(())
}
