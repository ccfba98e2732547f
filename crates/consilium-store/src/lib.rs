//! Append-only storage for Consilium ledger entries.
//!
//! This crate provides:
//! - The [`LedgerStore`] trait: append, ordered load, index repair and
//!   publication receipts
//! - [`FileLedger`], the persistent directory-of-JSON-files store
//! - [`MemoryLedger`], an in-process store used to stage rebuilds
//! - The derived [`LedgerIndex`] and drift detection
//!
//! ## Quick Start
//!
//! ```rust
//! use consilium_canonical::{ActorId, Credit, PrevHash, SourceUrl, Timestamp};
//! use consilium_core::{Distribution, Entry, EntryFields};
//! use consilium_store::{FileLedger, LedgerStore};
//!
//! let dir = tempfile::tempdir()?;
//! let mut ledger = FileLedger::open(dir.path().join("ledger"))?;
//!
//! let mut distribution = Distribution::new();
//! distribution.insert(ActorId::parse("alice")?, Credit::from_whole(100));
//! let entry = Entry::seal(EntryFields::credit_mint(
//!     1,
//!     SourceUrl::parse("https://github.com/acme/widgets/pull/1")?,
//!     distribution,
//!     Timestamp::now(),
//!     ledger.head_hash()?,
//! ))?;
//!
//! assert_eq!(ledger.append(entry)?, 1);
//! assert_eq!(ledger.index()?.entry_count, 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(missing_docs)]

/// Error types for store operations.
pub mod errors;
/// Directory-backed ledger.
pub mod file;
/// Derived index and drift checks.
pub mod index;
/// Advisory lock guard.
pub mod lock;
/// In-process ledger.
pub mod memory;
/// On-disk layout and reads.
pub mod reader;
/// The store trait and shared admission checks.
pub mod store;
/// Atomic file writes.
pub mod writer;

pub use errors::StoreError;
pub use file::FileLedger;
pub use index::{check_index, derive_index, IndexDrift, LedgerIndex};
pub use lock::LedgerLock;
pub use memory::MemoryLedger;
pub use reader::PublicationReceipt;
pub use store::{check_append, LedgerStore};
