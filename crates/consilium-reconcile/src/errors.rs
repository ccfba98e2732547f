use std::time::Duration;

use consilium_core::{EntryError, RuleError};
use consilium_store::StoreError;
use thiserror::Error;

/// Failure talking to the record host.
///
/// Timeouts, connection failures, rate limits and server errors are
/// retryable; anything the host rejected outright is not.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransientApiError {
    /// Request did not complete within the timeout.
    #[error("request timed out: {0}")]
    Timeout(String),
    /// Connection-level failure.
    #[error("network error: {0}")]
    Network(String),
    /// Rate limit exhausted; retry after the given delay.
    #[error("rate limited; resets in {}s", .reset_in.as_secs())]
    RateLimited {
        /// Time until the limit resets.
        reset_in: Duration,
    },
    /// Server-side failure (5xx).
    #[error("server error {status}: {message}")]
    Server {
        /// HTTP status.
        status: u16,
        /// Response text.
        message: String,
    },
    /// Request rejected (4xx other than rate limiting); not retried.
    #[error("request rejected with {status}: {message}")]
    Rejected {
        /// HTTP status.
        status: u16,
        /// Response text.
        message: String,
    },
    /// Response could not be decoded.
    #[error("unexpected response: {0}")]
    Decode(String),
    /// Every attempt failed.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        last: Box<TransientApiError>,
    },
}

impl TransientApiError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransientApiError::Timeout(_)
                | TransientApiError::Network(_)
                | TransientApiError::RateLimited { .. }
                | TransientApiError::Server { .. }
        )
    }
}

/// Publishing an entry failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The host could not be reached or refused the request.
    #[error(transparent)]
    Api(#[from] TransientApiError),
    /// The host accepted the request but returned no record id.
    #[error("publish returned no record id")]
    MissingRecordId,
    /// A record for the event already exists with different content.
    #[error("record {external_record_id} already published for this event with different content")]
    ConflictingRecord {
        /// Existing external record.
        external_record_id: u64,
    },
}

/// Local and remote state disagree in a way only a rebuild can settle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdempotencyConflict {
    /// A record for the event is published but the local ledger lacks it.
    #[error("event {event_id} is already published as record {external_record_id} but missing locally")]
    RemoteExistsLocalMissing {
        /// Event concerned.
        event_id: u64,
        /// Existing external record.
        external_record_id: u64,
    },
    /// Two published records carry the same event with different content.
    #[error("event {event_id} is published twice with different content (records {first} and {second})")]
    ConflictingRemoteRecords {
        /// Event concerned.
        event_id: u64,
        /// Earlier record.
        first: u64,
        /// Later record.
        second: u64,
    },
    /// The local entry for an event differs from the record published for it.
    #[error("local entry {seq} for event {event_id} differs from published record {external_record_id}")]
    PublishedDiffers {
        /// Event concerned.
        event_id: u64,
        /// Local sequence number.
        seq: u64,
        /// Published record.
        external_record_id: u64,
    },
    /// Another process minted the event first.
    #[error("event {event_id} was recorded concurrently")]
    ConcurrentMint {
        /// Event concerned.
        event_id: u64,
    },
}

impl IdempotencyConflict {
    /// Command that resolves the conflict.
    pub fn remediation(&self) -> &'static str {
        match self {
            IdempotencyConflict::RemoteExistsLocalMissing { .. } => {
                "run `consilium rebuild --repo OWNER/REPO` to import the published record"
            }
            IdempotencyConflict::ConflictingRemoteRecords { .. } => {
                "delete the duplicate record on the host, then run `consilium rebuild --repo OWNER/REPO --full`"
            }
            IdempotencyConflict::PublishedDiffers { .. } => {
                "run `consilium rebuild --repo OWNER/REPO --full` to replace local entries with the published chain"
            }
            IdempotencyConflict::ConcurrentMint { .. } => {
                "run `consilium verify --github --repo OWNER/REPO` to confirm the recorded entry"
            }
        }
    }
}

/// Errors raised by reconciliation runs.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Local store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// Invalid role policy.
    #[error("rule error: {0}")]
    Rule(#[from] RuleError),
    /// Entry could not be built.
    #[error("entry error: {0}")]
    Entry(#[from] EntryError),
    /// Record host unreachable.
    #[error("API error: {0}")]
    Api(#[from] TransientApiError),
    /// Local and remote disagree.
    #[error("{0}; {}", .0.remediation())]
    Conflict(#[from] IdempotencyConflict),
    /// A published record failed validation during rebuild; nothing was changed.
    #[error("record {record_id} is invalid: {reason}")]
    InvalidRecord {
        /// External record id.
        record_id: u64,
        /// What is wrong with it.
        reason: String,
    },
    /// Entry is committed locally but could not be published; re-run to retry the publish.
    #[error("entry {seq} committed locally but publish failed: {source}")]
    PublishPending {
        /// Sequence number of the committed entry.
        seq: u64,
        /// Why publishing failed.
        source: PublishError,
    },
}
