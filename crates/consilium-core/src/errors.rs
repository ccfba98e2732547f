use consilium_canonical::{Credit, EntryHash, PrevHash};
use thiserror::Error;

/// Structural problems with a single entry.
///
/// These are always fatal to the entry concerned and are never coerced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EntryError {
    /// A required field is absent or empty.
    #[error("missing field: {0}")]
    MissingField(&'static str),
    /// Field present but malformed.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// Wire name of the field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
    /// Unrecognized `version` tag.
    #[error("unsupported schema version {0:?}")]
    UnsupportedVersion(String),
    /// Unrecognized `type` tag.
    #[error("unsupported entry kind {0:?}")]
    UnsupportedKind(String),
    /// Unrecognized `outcome` tag.
    #[error("unsupported outcome {0:?}")]
    UnsupportedOutcome(String),
    /// Stored hash does not match the recomputed hash.
    #[error("hash mismatch: stored {stored}, computed {computed}")]
    BadHash {
        /// Hash carried by the entry.
        stored: EntryHash,
        /// Hash recomputed from its fields.
        computed: EntryHash,
    },
    /// A credit amount below zero.
    #[error("negative amount {amount} for {actor}")]
    NegativeAmount {
        /// Actor the amount was assigned to.
        actor: String,
        /// Offending amount.
        amount: f64,
    },
    /// Distribution has no recipients.
    #[error("distribution is empty")]
    EmptyDistribution,
    /// Hash input could not be produced.
    #[error("hashing failed: {0}")]
    Hashing(String),
}

/// Link failures between consecutive entries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// `prev_hash` does not equal the predecessor's hash.
    #[error("broken link: expected prev_hash {expected}, found {found}")]
    BrokenLink {
        /// Hash of the actual predecessor.
        expected: PrevHash,
        /// Value carried by the entry.
        found: PrevHash,
    },
    /// The first entry does not carry the genesis sentinel.
    #[error("first entry must link to genesis, found {found}")]
    GenesisMismatch {
        /// Value carried by the entry.
        found: PrevHash,
    },
}

/// Invalid role policy; raised before any entry is built.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    /// Author, reviewer and approver shares do not add up to one.
    #[error("shares must sum to 1.0, got {sum}")]
    SharesDoNotSumToOne {
        /// Actual sum.
        sum: f64,
    },
    /// A share is negative, above one, or not finite.
    #[error("{role} share {value} is outside [0, 1]")]
    InvalidShare {
        /// Role the share belongs to.
        role: &'static str,
        /// Offending value.
        value: f64,
    },
    /// Policy total is zero.
    #[error("policy total must be positive")]
    InvalidTotal,
    /// An entry does not mint exactly the policy total.
    #[error("event {event_id} mints {actual}, policy total is {expected}")]
    TotalMismatch {
        /// Event concerned.
        event_id: u64,
        /// Policy total.
        expected: Credit,
        /// Sum of the entry's distribution.
        actual: Credit,
    },
    /// A review timestamp could not be ordered.
    #[error("review by {actor} has unreadable timestamp {value}")]
    InvalidTimestamp {
        /// Reviewer.
        actor: String,
        /// Raw timestamp.
        value: String,
    },
}
