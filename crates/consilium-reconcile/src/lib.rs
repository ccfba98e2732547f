//! Reconciliation between the local Consilium ledger and its published records.
//!
//! This crate provides:
//! - [`Reconciler::local_verify`]: chain and index checks, no network
//! - [`Reconciler::remote_verify`]: read-only comparison with the host
//! - [`Reconciler::rebuild`]: replay published records into the store, atomically
//! - [`Reconciler::mint_and_append`]: idempotent mint, append and publish
//!
//! The host is reached through the [`RecordSource`] and [`Publisher`] traits,
//! so every operation runs against in-memory fakes in tests.
//!
#![deny(missing_docs)]

/// Verification, rebuild and minting.
pub mod engine;
/// Error types for reconciliation.
pub mod errors;
/// Retry policy for host calls.
pub mod retry;
/// Traits for reading and publishing records.
pub mod source;

pub use engine::{
    Divergence, MintOutcome, RebuildMode, RebuildReport, Reconciler, RemoteReport, VerifyOutcome,
};
pub use errors::{IdempotencyConflict, PublishError, ReconcileError, TransientApiError};
pub use retry::RetryPolicy;
pub use source::{ExternalRecord, Publisher, RecordSource};
