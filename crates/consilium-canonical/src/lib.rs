//! Canonical data model primitives for Consilium ledger entries.
//!
//! Everything that participates in entry hashing lives in this crate: the
//! canonical JSON encoder, the hex SHA-256 entry digest, the validated
//! identifier newtypes and the fixed-point [`Credit`] amount. Writers and
//! verifiers must go through the same functions here; any divergence would
//! silently break chain verification.
//!
#![deny(missing_docs)]

/// Canonicalization helpers for deterministic hashing.
pub mod canonicalizer;
/// Content hashing over canonical bytes.
pub mod content_hash;
/// Fixed-point credit amounts.
pub mod credit;
/// Entry digest and chain-link primitives.
pub mod digest;
/// Validated identifier newtypes.
pub mod identifiers;
/// Validation helpers used by canonical types.
pub mod validation;

pub use canonicalizer::{CanonicalizationError, Canonicalizer};
pub use content_hash::{compute_content_hash, verify_content_hash, ContentHashError};
pub use credit::Credit;
pub use digest::{EntryHash, PrevHash, GENESIS};
pub use identifiers::{ActorId, SourceUrl, Timestamp};
pub use validation::ValidationError;
