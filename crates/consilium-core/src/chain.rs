use std::collections::BTreeMap;
use std::fmt;

use consilium_canonical::{ActorId, Credit, EntryHash, PrevHash};

use crate::entry::{validate_entry, Entry};
use crate::errors::{ChainError, EntryError};

/// Checks that `current` links to `prev`, or to genesis when there is no predecessor.
pub fn validate_chain_link(current: &Entry, prev: Option<&Entry>) -> Result<(), ChainError> {
    match prev {
        None => {
            if current.prev_hash().is_genesis() {
                Ok(())
            } else {
                Err(ChainError::GenesisMismatch {
                    found: current.prev_hash().clone(),
                })
            }
        }
        Some(prev) => {
            let expected = PrevHash::Entry(prev.hash().clone());
            if current.prev_hash() == &expected {
                Ok(())
            } else {
                Err(ChainError::BrokenLink {
                    expected,
                    found: current.prev_hash().clone(),
                })
            }
        }
    }
}

/// Why an entry failed verification.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainFault {
    /// The entry itself is malformed or its hash does not match.
    Entry(EntryError),
    /// The entry does not link to its predecessor.
    Link(ChainError),
}

impl fmt::Display for ChainFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainFault::Entry(e) => write!(f, "{}", e),
            ChainFault::Link(e) => write!(f, "{}", e),
        }
    }
}

/// First failing position in a chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainBreak {
    /// Zero-based position of the offending entry.
    pub index: usize,
    /// What went wrong there.
    pub fault: ChainFault,
}

/// Result of walking a whole chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainReport {
    /// True when every entry and link checked out.
    pub valid: bool,
    /// First failure, if any.
    pub broken_at: Option<ChainBreak>,
    /// Every failure found, in order.
    pub faults: Vec<ChainBreak>,
    /// Balances over the valid prefix.
    pub balances: BTreeMap<ActorId, Credit>,
    /// Number of entries examined.
    pub entry_count: usize,
    /// Hash of the last entry of the valid prefix.
    pub head_hash: Option<EntryHash>,
}

/// Walks the whole sequence, checking each entry's hash and then its link.
///
/// Never stops early: every fault is collected, the first one is reported in
/// [`ChainReport::broken_at`]. Balances and head cover only the entries
/// before the first fault.
pub fn verify_chain(entries: &[Entry]) -> ChainReport {
    let mut faults = Vec::new();
    let mut balances: BTreeMap<ActorId, Credit> = BTreeMap::new();
    let mut head_hash = None;

    for (index, entry) in entries.iter().enumerate() {
        let prev = index.checked_sub(1).map(|i| &entries[i]);
        let fault = match validate_entry(entry) {
            Err(e) => Some(ChainFault::Entry(e)),
            Ok(()) => validate_chain_link(entry, prev).err().map(ChainFault::Link),
        };

        match fault {
            Some(fault) => faults.push(ChainBreak { index, fault }),
            None if faults.is_empty() => {
                for (actor, credit) in entry.distribution() {
                    *balances.entry(actor.clone()).or_default() += *credit;
                }
                head_hash = Some(entry.hash().clone());
            }
            None => {}
        }
    }

    ChainReport {
        valid: faults.is_empty(),
        broken_at: faults.first().cloned(),
        faults,
        balances,
        entry_count: entries.len(),
        head_hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Distribution, EntryFields};
    use consilium_canonical::{SourceUrl, Timestamp};

    fn mint(event_id: u64, prev: Option<&Entry>, credits: &[(&str, u64)]) -> Entry {
        let distribution: Distribution = credits
            .iter()
            .map(|(actor, whole)| (ActorId::parse(*actor).unwrap(), Credit::from_whole(*whole)))
            .collect();
        Entry::seal(EntryFields::credit_mint(
            event_id,
            SourceUrl::parse(format!("https://github.com/acme/widgets/pull/{}", event_id))
                .unwrap(),
            distribution,
            Timestamp::parse("2024-01-15T10:30:00Z").unwrap(),
            PrevHash::from(prev.map(Entry::hash)),
        ))
        .unwrap()
    }

    #[test]
    fn genesis_link() {
        let first = mint(1, None, &[("alice", 100)]);
        assert!(validate_chain_link(&first, None).is_ok());

        let second = mint(2, Some(&first), &[("bob", 100)]);
        assert!(matches!(
            validate_chain_link(&second, None),
            Err(ChainError::GenesisMismatch { .. })
        ));
        assert!(validate_chain_link(&second, Some(&first)).is_ok());
    }

    #[test]
    fn broken_link_names_expected_hash() {
        let first = mint(1, None, &[("alice", 100)]);
        let stray = mint(2, None, &[("bob", 100)]);
        match validate_chain_link(&stray, Some(&first)) {
            Err(ChainError::BrokenLink { expected, found }) => {
                assert_eq!(expected, PrevHash::Entry(first.hash().clone()));
                assert!(found.is_genesis());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn empty_chain_is_valid() {
        let report = verify_chain(&[]);
        assert!(report.valid);
        assert_eq!(report.entry_count, 0);
        assert!(report.head_hash.is_none());
    }

    #[test]
    fn balances_sum_over_chain() {
        let a = mint(1, None, &[("alice", 50), ("bob", 50)]);
        let b = mint(2, Some(&a), &[("alice", 100)]);
        let report = verify_chain(&[a, b.clone()]);
        assert!(report.valid);
        assert_eq!(report.head_hash.as_ref(), Some(b.hash()));
        assert_eq!(
            report.balances[&ActorId::parse("alice").unwrap()],
            Credit::from_whole(150)
        );
    }

    #[test]
    fn collects_every_fault_and_reports_first() {
        let a = mint(1, None, &[("alice", 100)]);
        let b = mint(2, None, &[("bob", 100)]);
        let c = mint(3, None, &[("carol", 100)]);
        let report = verify_chain(&[a.clone(), b, c]);
        assert!(!report.valid);
        assert_eq!(report.faults.len(), 2);
        assert_eq!(report.broken_at.as_ref().map(|b| b.index), Some(1));
        assert_eq!(report.head_hash.as_ref(), Some(a.hash()));
        assert_eq!(report.entry_count, 3);
    }
}
