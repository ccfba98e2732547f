use consilium_canonical::PrevHash;
use consilium_core::{validate_entry, Entry};

use crate::errors::StoreError;
use crate::index::{check_index, LedgerIndex};

/// Append-only, ordered storage of ledger entries.
///
/// Sequence numbers are 1-based and assigned by `append`.
pub trait LedgerStore {
    /// Appends `entry`, returning its sequence number.
    ///
    /// Rejects invalid entries, event ids already present and entries that
    /// do not link to the current head. Nothing changes on rejection.
    fn append(&mut self, entry: Entry) -> Result<u64, StoreError>;

    /// Every entry in sequence order, with external record ids applied.
    fn load_all(&self) -> Result<Vec<Entry>, StoreError>;

    /// Current index.
    fn index(&self) -> Result<LedgerIndex, StoreError>;

    /// Recomputes the index from the entries and persists it.
    fn repair_index(&mut self) -> Result<LedgerIndex, StoreError>;

    /// Records the external record id of entry `seq`. Allowed once per entry.
    fn record_publication(&mut self, seq: u64, external_record_id: u64)
        -> Result<(), StoreError>;

    /// Replaces the whole ledger with `entries` in one step.
    ///
    /// The chain must be valid; on failure the previous contents stay in place.
    fn replace_all(&mut self, entries: Vec<Entry>) -> Result<LedgerIndex, StoreError>;

    /// Checks the stored index against the entries.
    fn verify_index(&self) -> Result<(), StoreError> {
        check_index(Some(&self.index()?), &self.load_all()?)
    }

    /// Hash the next entry must link to.
    fn head_hash(&self) -> Result<PrevHash, StoreError> {
        Ok(self.index()?.head_hash)
    }

    /// Entry with sequence number `seq`.
    fn get(&self, seq: u64) -> Result<Option<Entry>, StoreError> {
        if seq == 0 {
            return Ok(None);
        }
        Ok(self.load_all()?.into_iter().nth((seq - 1) as usize))
    }

    /// Entry recorded for `event_id`, with its sequence number.
    fn find_by_event_id(&self, event_id: u64) -> Result<Option<(u64, Entry)>, StoreError> {
        Ok(sequenced(self.load_all()?).find(|(_, e)| e.event_id() == event_id))
    }

    /// Entry published as `external_record_id`, with its sequence number.
    fn find_by_external_record_id(
        &self,
        external_record_id: u64,
    ) -> Result<Option<(u64, Entry)>, StoreError> {
        Ok(sequenced(self.load_all()?)
            .find(|(_, e)| e.external_record_id() == Some(external_record_id)))
    }
}

fn sequenced(entries: Vec<Entry>) -> impl Iterator<Item = (u64, Entry)> {
    entries
        .into_iter()
        .enumerate()
        .map(|(i, e)| (i as u64 + 1, e))
}

/// Admission checks shared by every store: valid entry, new event id, linked to `head`.
pub fn check_append(existing: &[Entry], head: &PrevHash, entry: &Entry) -> Result<(), StoreError> {
    validate_entry(entry)?;
    if existing.iter().any(|e| e.event_id() == entry.event_id()) {
        return Err(StoreError::DuplicateEventId(entry.event_id()));
    }
    if entry.prev_hash() != head {
        return Err(StoreError::NotContiguous {
            expected: head.clone(),
            found: entry.prev_hash().clone(),
        });
    }
    Ok(())
}

/// Checks that no event id appears twice in `entries`.
pub fn check_unique_events(entries: &[Entry]) -> Result<(), StoreError> {
    let mut seen = std::collections::BTreeSet::new();
    for entry in entries {
        if !seen.insert(entry.event_id()) {
            return Err(StoreError::DuplicateEventId(entry.event_id()));
        }
    }
    Ok(())
}
