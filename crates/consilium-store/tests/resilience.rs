use consilium_canonical::{ActorId, Credit, PrevHash, SourceUrl, Timestamp};
use consilium_core::{Distribution, Entry, EntryFields};
use consilium_store::{FileLedger, IndexDrift, LedgerLock, LedgerStore, StoreError};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

fn make_entry(event_id: u64, prev: PrevHash) -> Entry {
    let mut distribution = Distribution::new();
    distribution.insert(ActorId::parse("alice").unwrap(), Credit::from_whole(100));
    Entry::seal(EntryFields::credit_mint(
        event_id,
        SourceUrl::parse(format!("https://github.com/acme/widgets/pull/{}", event_id)).unwrap(),
        distribution,
        Timestamp::parse("2024-01-15T10:30:00Z").unwrap(),
        prev,
    ))
    .unwrap()
}

fn ledger_with(n: u64) -> (TempDir, FileLedger) {
    let temp_dir = TempDir::new().unwrap();
    let mut ledger = FileLedger::open(temp_dir.path().join("ledger")).unwrap();
    for event_id in 1..=n {
        let entry = make_entry(event_id, ledger.head_hash().unwrap());
        ledger.append(entry).unwrap();
    }
    (temp_dir, ledger)
}

fn edit_json(path: &std::path::Path, edit: impl FnOnce(&mut serde_json::Value)) {
    let mut value: serde_json::Value = serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
    edit(&mut value);
    fs::write(path, serde_json::to_vec_pretty(&value).unwrap()).unwrap();
}

#[test]
fn test_edited_index_blocks_append_until_repaired() {
    let (_dir, mut ledger) = ledger_with(2);
    edit_json(&ledger.root().join("index.json"), |index| {
        index["entry_count"] = json!(5);
    });

    assert!(matches!(
        ledger.verify_index(),
        Err(StoreError::IndexDrift(IndexDrift::EntryCount { index: 5, derived: 2 }))
    ));
    let next = make_entry(3, ledger.head_hash().unwrap());
    assert!(matches!(
        ledger.append(next.clone()),
        Err(StoreError::IndexDrift(_))
    ));

    let repaired = ledger.repair_index().unwrap();
    assert_eq!(repaired.entry_count, 2);
    assert!(ledger.verify_index().is_ok());
    assert_eq!(ledger.append(next).unwrap(), 3);
}

#[test]
fn test_balance_drift_is_detected() {
    let (_dir, ledger) = ledger_with(1);
    edit_json(&ledger.root().join("index.json"), |index| {
        index["balances"]["alice"] = json!(1000.0);
    });
    assert!(matches!(
        ledger.verify_index(),
        Err(StoreError::IndexDrift(IndexDrift::Balances))
    ));
}

#[test]
fn test_missing_index_is_drift() {
    let (_dir, mut ledger) = ledger_with(1);
    fs::remove_file(ledger.root().join("index.json")).unwrap();
    assert!(matches!(
        ledger.verify_index(),
        Err(StoreError::IndexDrift(IndexDrift::Missing { entry_count: 1 }))
    ));
    ledger.repair_index().unwrap();
    assert!(ledger.verify_index().is_ok());
}

#[test]
fn test_repair_refuses_tampered_chain() {
    let (_dir, mut ledger) = ledger_with(2);
    edit_json(&ledger.root().join("entries/0001.json"), |entry| {
        entry["distribution"]["alice"] = json!(99.0);
    });
    assert!(matches!(
        ledger.repair_index(),
        Err(StoreError::IndexRepairFailed { index: 0, .. })
    ));
}

#[test]
fn test_sequence_gap_is_an_error() {
    let (_dir, ledger) = ledger_with(3);
    fs::remove_file(ledger.root().join("entries/0002.json")).unwrap();
    assert!(matches!(
        ledger.load_all(),
        Err(StoreError::SequenceGap { expected: 2, found: 3 })
    ));
}

#[test]
fn test_unknown_version_on_disk_is_rejected() {
    let (_dir, ledger) = ledger_with(1);
    edit_json(&ledger.root().join("entries/0001.json"), |entry| {
        entry["version"] = json!("0.2");
    });
    assert!(matches!(
        ledger.load_all(),
        Err(StoreError::InvalidEntry(_))
    ));
}

#[test]
fn test_held_lock_blocks_writers() {
    let (_dir, mut ledger) = ledger_with(1);
    let guard = LedgerLock::acquire(&ledger.lock_path()).unwrap();

    let next = make_entry(2, ledger.head_hash().unwrap());
    assert!(matches!(
        ledger.append(next.clone()),
        Err(StoreError::Locked(_))
    ));

    drop(guard);
    assert_eq!(ledger.append(next).unwrap(), 2);
}

#[test]
fn test_lock_survives_replace_all() {
    let (_dir, mut ledger) = ledger_with(2);
    let entries = ledger.load_all().unwrap();
    ledger.replace_all(entries[..1].to_vec()).unwrap();
    assert!(!ledger.root().join("ledger.lock").exists());

    let guard = LedgerLock::acquire(&ledger.lock_path()).unwrap();
    assert!(matches!(
        ledger.replace_all(entries.clone()),
        Err(StoreError::Locked(_))
    ));
    drop(guard);
    assert_eq!(ledger.replace_all(entries).unwrap().entry_count, 2);
}

#[test]
fn test_interrupted_swap_is_restored_on_open() {
    let (dir, ledger) = ledger_with(2);
    let root = ledger.root().to_path_buf();
    fs::rename(&root, dir.path().join(".ledger.previous")).unwrap();

    let reopened = FileLedger::open(&root).unwrap();
    assert_eq!(reopened.load_all().unwrap().len(), 2);
    assert!(!dir.path().join(".ledger.previous").exists());
}
