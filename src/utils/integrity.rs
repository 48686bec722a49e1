// src/utils/integrity.rs

use sha2::{Digest, Sha256};

/// Hash the locked exam browser sends for a request:
/// lowercase hex SHA-256 over the raw bytes of `url` followed by `key`.
///
/// No normalisation is applied to either input.
pub fn request_hash(url: &str, key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compares a caller-supplied hash with the expected one, byte for byte.
pub fn hash_matches(url: &str, key: &str, supplied: Option<&str>) -> bool {
    match supplied {
        Some(hash) => hash == request_hash(url, key),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        // sha256("abc")
        assert_eq!(
            request_hash("ab", "c"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_deterministic() {
        let url = "https://exam.local/api/exams/1/session";
        assert_eq!(request_hash(url, "k"), request_hash(url, "k"));
    }

    #[test]
    fn test_one_byte_changes_hash() {
        let a = request_hash("https://exam.local/api/exams/1", "k");
        let b = request_hash("https://exam.local/api/exams/2", "k");
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_matches() {
        let url = "https://exam.local/x";
        let good = request_hash(url, "key");
        assert!(hash_matches(url, "key", Some(&good)));
        assert!(!hash_matches(url, "key", Some(&good.to_uppercase())));
        assert!(!hash_matches(url, "key", None));
        assert!(!hash_matches(&format!("{}/", url), "key", Some(&good)));
    }
}
