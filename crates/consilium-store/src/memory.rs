use consilium_core::Entry;

use crate::errors::StoreError;
use crate::index::{derive_index, LedgerIndex};
use crate::store::{check_append, check_unique_events, LedgerStore};

/// In-process store. Used to stage rebuilds and in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    entries: Vec<Entry>,
    index: LedgerIndex,
}

impl MemoryLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger holding `entries`, which must form a valid chain.
    pub fn from_entries(entries: Vec<Entry>) -> Result<Self, StoreError> {
        let mut ledger = Self::new();
        ledger.replace_all(entries)?;
        Ok(ledger)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consumes the ledger, returning its entries.
    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }
}

impl LedgerStore for MemoryLedger {
    fn append(&mut self, entry: Entry) -> Result<u64, StoreError> {
        check_append(&self.entries, &self.index.head_hash, &entry)?;
        self.index = self.index.with_entry(&entry);
        self.entries.push(entry);
        Ok(self.entries.len() as u64)
    }

    fn load_all(&self) -> Result<Vec<Entry>, StoreError> {
        Ok(self.entries.clone())
    }

    fn index(&self) -> Result<LedgerIndex, StoreError> {
        Ok(self.index.clone())
    }

    fn repair_index(&mut self) -> Result<LedgerIndex, StoreError> {
        self.index = derive_index(&self.entries)?;
        Ok(self.index.clone())
    }

    fn record_publication(
        &mut self,
        seq: u64,
        external_record_id: u64,
    ) -> Result<(), StoreError> {
        let slot = seq
            .checked_sub(1)
            .and_then(|i| self.entries.get_mut(i as usize))
            .ok_or(StoreError::UnknownSequence(seq))?;
        if let Some(existing) = slot.external_record_id() {
            return Err(StoreError::AlreadyPublished {
                seq,
                external_record_id: existing,
            });
        }
        *slot = slot.clone().with_external_record_id(external_record_id);
        Ok(())
    }

    fn replace_all(&mut self, entries: Vec<Entry>) -> Result<LedgerIndex, StoreError> {
        check_unique_events(&entries)?;
        let index = derive_index(&entries)?;
        self.entries = entries;
        self.index = index.clone();
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consilium_canonical::{ActorId, Credit, PrevHash, SourceUrl, Timestamp};
    use consilium_core::{Distribution, EntryFields};

    fn mint(event_id: u64, prev: PrevHash) -> Entry {
        let mut distribution = Distribution::new();
        distribution.insert(ActorId::parse("alice").unwrap(), Credit::from_whole(100));
        Entry::seal(EntryFields::credit_mint(
            event_id,
            SourceUrl::parse(format!("https://github.com/acme/widgets/pull/{}", event_id))
                .unwrap(),
            distribution,
            Timestamp::parse("2024-01-15T10:30:00Z").unwrap(),
            prev,
        ))
        .unwrap()
    }

    #[test]
    fn append_tracks_head_and_balances() {
        let mut ledger = MemoryLedger::new();
        let first = mint(1, PrevHash::Genesis);
        assert_eq!(ledger.append(first.clone()).unwrap(), 1);
        let second = mint(2, PrevHash::from(first.hash().clone()));
        assert_eq!(ledger.append(second.clone()).unwrap(), 2);

        let index = ledger.index().unwrap();
        assert_eq!(index.head_hash, PrevHash::from(second.hash().clone()));
        assert_eq!(
            index.balance(&ActorId::parse("alice").unwrap()),
            Credit::from_whole(200)
        );
    }

    #[test]
    fn rejects_duplicates_and_forks() {
        let mut ledger = MemoryLedger::new();
        let first = mint(1, PrevHash::Genesis);
        ledger.append(first.clone()).unwrap();

        assert!(matches!(
            ledger.append(first.clone()),
            Err(StoreError::DuplicateEventId(1))
        ));
        assert!(matches!(
            ledger.append(mint(2, PrevHash::Genesis)),
            Err(StoreError::NotContiguous { .. })
        ));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn publication_is_recorded_once() {
        let mut ledger = MemoryLedger::new();
        ledger.append(mint(1, PrevHash::Genesis)).unwrap();
        ledger.record_publication(1, 500).unwrap();
        assert_eq!(
            ledger.find_by_external_record_id(500).unwrap().map(|(s, _)| s),
            Some(1)
        );
        assert!(matches!(
            ledger.record_publication(1, 501),
            Err(StoreError::AlreadyPublished { external_record_id: 500, .. })
        ));
        assert!(matches!(
            ledger.record_publication(9, 1),
            Err(StoreError::UnknownSequence(9))
        ));
    }
}
