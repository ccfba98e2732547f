//! Content hashing over canonical bytes.
//!
//! An entry hash is `sha256(canonical_bytes(fields))`, hex-encoded, where
//! `fields` excludes the `hash` itself and the `comment_id` assigned after
//! publication.

use crate::{Canonicalizer, EntryHash};
use serde::Serialize;
use serde_json::Value;

/// Top-level keys never included in the hash input.
pub const UNHASHED_FIELDS: [&str; 2] = ["hash", "comment_id"];

/// Computes the content hash of a serializable field set.
///
/// The value is serialized to JSON, stripped of [`UNHASHED_FIELDS`],
/// canonicalized, and hashed with SHA-256.
///
/// # Example
///
/// ```rust
/// use consilium_canonical::{compute_content_hash, Canonicalizer};
/// use serde_json::json;
///
/// let fields = json!({ "pr_number": 42, "distribution": { "alice": "100" } });
/// let hash = compute_content_hash(&fields, &Canonicalizer::new())?;
/// assert_eq!(hash.as_str().len(), 64);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
///
/// # Errors
///
/// Returns [`ContentHashError`] if serialization or canonicalization fails.
pub fn compute_content_hash<T: Serialize>(
    fields: &T,
    canonicalizer: &Canonicalizer,
) -> Result<EntryHash, ContentHashError> {
    let mut value: Value =
        serde_json::to_value(fields).map_err(|e| ContentHashError::Serialization(e.to_string()))?;

    match &mut value {
        Value::Object(map) => {
            for key in UNHASHED_FIELDS {
                map.remove(key);
            }
        }
        _ => {
            return Err(ContentHashError::NotAnObject);
        }
    }

    let bytes = canonicalizer.canonicalize(&value)?;
    Ok(EntryHash::of_bytes(&bytes))
}

/// Error during content hash computation.
#[derive(thiserror::Error, Debug)]
pub enum ContentHashError {
    /// Serialization failed.
    #[error("serialization failed: {0}")]
    Serialization(String),
    /// Hash input must be a JSON object.
    #[error("hash input is not a JSON object")]
    NotAnObject,
    /// Canonicalization failed.
    #[error("canonicalization failed: {0}")]
    Canonicalization(#[from] crate::CanonicalizationError),
}

/// Verifies that a claimed hash matches the computed content hash.
pub fn verify_content_hash<T: Serialize>(
    fields: &T,
    claimed: &EntryHash,
    canonicalizer: &Canonicalizer,
) -> Result<bool, ContentHashError> {
    let computed = compute_content_hash(fields, canonicalizer)?;
    Ok(claimed == &computed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ignores_hash_and_comment_id() {
        let c = Canonicalizer::new();
        let bare = json!({ "pr_number": 1, "source": "https://x/1" });
        let decorated = json!({
            "pr_number": 1,
            "source": "https://x/1",
            "hash": "whatever",
            "comment_id": 99
        });
        assert_eq!(
            compute_content_hash(&bare, &c).unwrap(),
            compute_content_hash(&decorated, &c).unwrap()
        );
    }

    #[test]
    fn any_field_change_changes_hash() {
        let c = Canonicalizer::new();
        let a = json!({ "distribution": { "alice": "50", "bob": "50" } });
        let b = json!({ "distribution": { "alice": "50", "bob": "50.01" } });
        assert_ne!(
            compute_content_hash(&a, &c).unwrap(),
            compute_content_hash(&b, &c).unwrap()
        );
    }

    #[test]
    fn rejects_non_objects() {
        let err = compute_content_hash(&json!(["a"]), &Canonicalizer::new()).unwrap_err();
        assert!(matches!(err, ContentHashError::NotAnObject));
    }

    #[test]
    fn verify_detects_mismatch() {
        let c = Canonicalizer::new();
        let fields = json!({ "pr_number": 7 });
        let hash = compute_content_hash(&fields, &c).unwrap();
        assert!(verify_content_hash(&fields, &hash, &c).unwrap());
        let other = EntryHash::of_bytes(b"other");
        assert!(!verify_content_hash(&fields, &other, &c).unwrap());
    }
}
