//! Derived ledger index.
//!
//! The index caches the head hash, the entry count and the balance of every
//! actor. It is always recomputable from the entries and never authoritative.

use std::collections::BTreeMap;

use consilium_canonical::{ActorId, Credit, PrevHash, Timestamp};
use consilium_core::{verify_chain, Entry};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::StoreError;

/// Version tag written into `index.json`.
pub const INDEX_VERSION: &str = "0.1";

/// Cached chain summary, persisted as `index.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerIndex {
    /// Index format version.
    pub version: String,
    /// Hash of the last entry, or genesis for an empty ledger.
    pub head_hash: PrevHash,
    /// Number of entries.
    pub entry_count: u64,
    /// Sum of credit per actor.
    pub balances: BTreeMap<ActorId, Credit>,
    /// When the index was last written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Timestamp>,
}

impl Default for LedgerIndex {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION.to_string(),
            head_hash: PrevHash::Genesis,
            entry_count: 0,
            balances: BTreeMap::new(),
            last_updated: None,
        }
    }
}

impl LedgerIndex {
    /// Index after appending `entry`.
    pub fn with_entry(&self, entry: &Entry) -> Self {
        let mut next = self.clone();
        for (actor, credit) in entry.distribution() {
            *next.balances.entry(actor.clone()).or_default() += *credit;
        }
        next.head_hash = PrevHash::Entry(entry.hash().clone());
        next.entry_count += 1;
        next
    }

    /// Stamps `last_updated` with the current time.
    pub fn touched(mut self) -> Self {
        self.last_updated = Some(Timestamp::now());
        self
    }

    /// Balance of one actor; zero if never credited.
    pub fn balance(&self, actor: &ActorId) -> Credit {
        self.balances.get(actor).copied().unwrap_or_default()
    }

    /// Actors ordered by balance, highest first; ties by actor id.
    pub fn leaderboard(&self) -> Vec<(&ActorId, Credit)> {
        let mut rows: Vec<_> = self.balances.iter().map(|(a, c)| (a, *c)).collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        rows
    }

    /// Compares chain state with a freshly derived index, ignoring metadata.
    pub fn drift_from(&self, derived: &LedgerIndex) -> Option<IndexDrift> {
        if self.head_hash != derived.head_hash {
            return Some(IndexDrift::HeadHash {
                index: self.head_hash.clone(),
                derived: derived.head_hash.clone(),
            });
        }
        if self.entry_count != derived.entry_count {
            return Some(IndexDrift::EntryCount {
                index: self.entry_count,
                derived: derived.entry_count,
            });
        }
        if self.balances != derived.balances {
            return Some(IndexDrift::Balances);
        }
        None
    }
}

/// How a stored index disagrees with the entries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexDrift {
    /// No index file although entries exist.
    #[error("index missing for {entry_count} entries")]
    Missing {
        /// Number of entries on disk.
        entry_count: u64,
    },
    /// Head hash differs.
    #[error("head hash mismatch (index={index}, computed={derived})")]
    HeadHash {
        /// Stored value.
        index: PrevHash,
        /// Value derived from the entries.
        derived: PrevHash,
    },
    /// Entry count differs.
    #[error("entry count mismatch (index={index}, actual={derived})")]
    EntryCount {
        /// Stored value.
        index: u64,
        /// Number of entries.
        derived: u64,
    },
    /// Balances differ.
    #[error("balance drift (index and entries disagree)")]
    Balances,
}

/// Replays `entries` through chain verification and derives their index.
///
/// Fails with [`StoreError::IndexRepairFailed`] when the chain is broken;
/// an index is only ever derived from a valid chain.
pub fn derive_index(entries: &[Entry]) -> Result<LedgerIndex, StoreError> {
    let report = verify_chain(entries);
    if let Some(broken) = report.broken_at {
        return Err(StoreError::IndexRepairFailed {
            index: broken.index,
            reason: broken.fault.to_string(),
        });
    }
    Ok(LedgerIndex {
        head_hash: PrevHash::from(report.head_hash.as_ref()),
        entry_count: entries.len() as u64,
        balances: report.balances,
        ..LedgerIndex::default()
    })
}

/// Checks a stored index against the entries it should describe.
pub fn check_index(stored: Option<&LedgerIndex>, entries: &[Entry]) -> Result<(), StoreError> {
    let derived = derive_index(entries)?;
    match stored {
        None if entries.is_empty() => Ok(()),
        None => Err(StoreError::IndexDrift(IndexDrift::Missing {
            entry_count: entries.len() as u64,
        })),
        Some(index) => match index.drift_from(&derived) {
            Some(drift) => Err(StoreError::IndexDrift(drift)),
            None => Ok(()),
        },
    }
}
