//! Content hashing helpers
//!
//! BLAKE3 is used everywhere a content-addressed key is needed: the
//! embedding cache, the query-result cache, and deterministic relationship
//! ids. Same input always produces the same hex digest.

/// Compute the BLAKE3 hash of a string and return it as hex
pub fn content_hash(data: &str) -> String {
    let hash = blake3::hash(data.as_bytes());
    hex::encode(hash.as_bytes())
}

/// Deterministic relationship id derived from the identity triple
///
/// Two store calls with the same (source, target, type) produce the same
/// id, so duplicates collapse into an upsert.
pub fn relationship_id(source: &str, target: &str, relationship_type: &str) -> String {
    content_hash(&format!("{source}|{target}|{relationship_type}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_deterministic() {
        assert_eq!(content_hash("hello"), content_hash("hello"));
        assert_ne!(content_hash("hello"), content_hash("world"));
    }

    #[test]
    fn test_relationship_id_collapses_duplicates() {
        let a = relationship_id("n1", "n2", "references");
        let b = relationship_id("n1", "n2", "references");
        assert_eq!(a, b);
    }

    #[test]
    fn test_relationship_id_distinct_per_triple() {
        let forward = relationship_id("n1", "n2", "references");
        let reverse = relationship_id("n2", "n1", "references");
        let typed = relationship_id("n1", "n2", "sequential");
        assert_ne!(forward, reverse);
        assert_ne!(forward, typed);
    }
}
