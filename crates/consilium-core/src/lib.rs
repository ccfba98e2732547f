//! Entry model, chain verification and credit rules for the Consilium ledger.
//!
//! This crate provides:
//! - The immutable [`Entry`] record and its hash computation
//! - Link and whole-chain verification ([`validate_chain_link`], [`verify_chain`])
//! - The deterministic credit rule engine ([`compute_distribution`])
//! - The published comment format ([`record::render_comment`], [`record::parse_comment`])
//!
//! Core invariants:
//! - Entries are immutable; corrections are new entries
//! - `hash = sha256(canonical_bytes(fields))`, excluding `hash` and `comment_id`
//! - Entry 0 links to `"genesis"`, entry *i* links to the hash of entry *i-1*
//! - Distributions are fixed-point and sum exactly to the policy total
//!
#![deny(missing_docs)]

/// Whole-chain and link verification.
pub mod chain;
/// Credit distribution rules.
pub mod credit;
/// Ledger entry types and hashing.
pub mod entry;
/// Error types for core operations.
pub mod errors;
/// Published comment format.
pub mod record;

pub use chain::{validate_chain_link, verify_chain, ChainBreak, ChainFault, ChainReport};
pub use credit::{
    check_policy_total, compute_distribution, MergeEvent, ReviewState, ReviewVerdict, RolePolicy,
    SHARE_TOLERANCE,
};
pub use entry::{
    compute_hash, validate_entry, Distribution, Entry, EntryFields, EntryKind, EntryRecord,
    Outcome, SchemaVersion,
};
pub use errors::{ChainError, EntryError, RuleError};
pub use record::{parse_comment, render_comment, RecordParseError, COMMENT_BEGIN, COMMENT_END};
