use std::io;
use std::path::PathBuf;

use consilium_canonical::PrevHash;
use consilium_core::EntryError;
use thiserror::Error;

use crate::index::IndexDrift;

/// Errors raised by ledger stores.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Entry does not link to the current head.
    #[error("entry is not contiguous: head is {expected}, entry links to {found}")]
    NotContiguous {
        /// Current head.
        expected: PrevHash,
        /// `prev_hash` carried by the rejected entry.
        found: PrevHash,
    },
    /// An entry for this event already exists.
    #[error("event {0} is already recorded")]
    DuplicateEventId(u64),
    /// Durable write did not complete.
    #[error("write to {path} failed: {source}")]
    WriteFailure {
        /// Target file.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// The swapped-in ledger could not be moved into place, and the
    /// previous ledger could not be moved back either.
    #[error(
        "swap into {path} failed: {swap}; restoring {backup} also failed: {rollback}"
    )]
    SwapRollbackFailed {
        /// Ledger root.
        path: PathBuf,
        /// Where the previous ledger was left.
        backup: PathBuf,
        /// Error from moving the staged ledger into place.
        swap: io::Error,
        /// Error from moving the previous ledger back.
        rollback: io::Error,
    },
    /// A ledger file could not be read.
    #[error("read of {path} failed: {source}")]
    ReadFailure {
        /// File or directory being read.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// A ledger file is not valid JSON for its kind.
    #[error("malformed {path}: {reason}")]
    Malformed {
        /// Offending file.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },
    /// Entry fails structural or hash validation.
    #[error("invalid entry: {0}")]
    InvalidEntry(#[from] EntryError),
    /// Index disagrees with the entry files; run `repair_index`.
    #[error("index drift: {0}; run repair_index")]
    IndexDrift(IndexDrift),
    /// Entry files are not numbered contiguously from 1.
    #[error("sequence gap: expected entry {expected}, found {found}")]
    SequenceGap {
        /// Next expected sequence number.
        expected: u64,
        /// Sequence number actually found.
        found: u64,
    },
    /// Replayed chain is invalid, so the index cannot be derived.
    #[error("cannot repair index: entry {index} is invalid: {reason}")]
    IndexRepairFailed {
        /// Zero-based position of the first bad entry.
        index: usize,
        /// What is wrong with it.
        reason: String,
    },
    /// A publication receipt already exists for this entry.
    #[error("entry {seq} is already published as record {external_record_id}")]
    AlreadyPublished {
        /// Sequence number of the entry.
        seq: u64,
        /// Record id already on file.
        external_record_id: u64,
    },
    /// No entry with this sequence number.
    #[error("no entry with sequence number {0}")]
    UnknownSequence(u64),
    /// Another process holds the ledger lock.
    #[error("ledger at {0} is locked by another process")]
    Locked(PathBuf),
}
