//! Directory-backed ledger.
//!
//! Layout under the ledger root:
//!
//! ```text
//! index.json          derived LedgerIndex
//! entries/0001.json   entry 1
//! receipts/0001.json  publication receipt for entry 1 (optional)
//! ```
//!
//! The advisory lock is `.{name}.lock` next to the root, so it stays in
//! place while [`LedgerStore::replace_all`] swaps the root directory.
//!
//! Entry files are written once and never modified. Every write goes
//! through a temp file and a rename, and every mutating operation holds
//! the exclusive lock for its whole duration.

use std::fs;
use std::path::{Path, PathBuf};

use consilium_core::Entry;
use tracing::{debug, error, info, warn};

use crate::errors::StoreError;
use crate::index::{check_index, derive_index, IndexDrift, LedgerIndex};
use crate::lock::LedgerLock;
use crate::reader::{
    entry_path, read_entry, read_optional_json, read_sequence_numbers, receipt_path,
    PublicationReceipt, ENTRIES_DIR, INDEX_FILE, RECEIPTS_DIR,
};
use crate::store::{check_append, check_unique_events, LedgerStore};
use crate::writer::{create_json_atomic, write_json_atomic};

/// Persistent ledger in a directory of JSON files.
#[derive(Debug, Clone)]
pub struct FileLedger {
    root: PathBuf,
}

impl FileLedger {
    /// Opens the ledger at `root`, creating the directory layout if needed.
    ///
    /// A swap interrupted between its two renames is finished here by
    /// restoring the previous ledger.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let ledger = Self { root: root.into() };
        let backup = ledger.sibling("previous");
        if !ledger.root.exists() && backup.exists() {
            warn!(path = %backup.display(), "restoring ledger left by an interrupted rebuild");
            rename_dir(&backup, &ledger.root)?;
        }
        for dir in [ENTRIES_DIR, RECEIPTS_DIR] {
            let path = ledger.root.join(dir);
            fs::create_dir_all(&path)
                .map_err(|source| StoreError::WriteFailure { path, source })?;
        }
        Ok(ledger)
    }

    /// Ledger root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Index as stored on disk, if any.
    pub fn stored_index(&self) -> Result<Option<LedgerIndex>, StoreError> {
        read_optional_json(&self.root.join(INDEX_FILE))
    }

    /// Path of the advisory lock file, a sibling of the root.
    pub fn lock_path(&self) -> PathBuf {
        self.sibling("lock")
    }

    fn lock(&self) -> Result<LedgerLock, StoreError> {
        LedgerLock::acquire(&self.lock_path())
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let name = self
            .root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("ledger");
        self.root.with_file_name(format!(".{}.{}", name, suffix))
    }

    fn write_ledger(root: &Path, entries: &[Entry], index: &LedgerIndex) -> Result<(), StoreError> {
        for (i, entry) in entries.iter().enumerate() {
            let seq = i as u64 + 1;
            write_json_atomic(&entry_path(root, seq), &unpublished(entry))?;
            if let Some(comment_id) = entry.external_record_id() {
                write_json_atomic(&receipt_path(root, seq), &PublicationReceipt { seq, comment_id })?;
            }
        }
        write_json_atomic(&root.join(INDEX_FILE), index)
    }
}

// Entry files never carry the external record id; receipts do.
fn unpublished(entry: &Entry) -> Entry {
    Entry::from_parts(entry.fields().clone(), entry.hash().clone(), None)
}

fn rename_dir(from: &Path, to: &Path) -> Result<(), StoreError> {
    fs::rename(from, to).map_err(|source| StoreError::WriteFailure {
        path: to.to_path_buf(),
        source,
    })
}

// Puts `backup` back at `root` after the staging rename failed.
fn roll_back_swap(backup: &Path, root: &Path, swap: std::io::Error) -> StoreError {
    match fs::rename(backup, root) {
        Ok(()) => StoreError::WriteFailure {
            path: root.to_path_buf(),
            source: swap,
        },
        Err(rollback) => {
            error!(
                root = %root.display(),
                backup = %backup.display(),
                %swap,
                %rollback,
                "ledger swap failed and the previous ledger was not restored"
            );
            StoreError::SwapRollbackFailed {
                path: root.to_path_buf(),
                backup: backup.to_path_buf(),
                swap,
                rollback,
            }
        }
    }
}

fn remove_dir_if_exists(path: &Path) -> Result<(), StoreError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(StoreError::WriteFailure {
            path: path.to_path_buf(),
            source,
        }),
    }
}

impl LedgerStore for FileLedger {
    fn append(&mut self, entry: Entry) -> Result<u64, StoreError> {
        let _lock = self.lock()?;
        let existing = self.load_all()?;
        let stored = self.stored_index()?;
        check_index(stored.as_ref(), &existing)?;
        let index = stored.unwrap_or_default();
        check_append(&existing, &index.head_hash, &entry)?;

        let seq = index.entry_count + 1;
        let path = entry_path(&self.root, seq);
        if !create_json_atomic(&path, &unpublished(&entry))? {
            return Err(StoreError::IndexDrift(IndexDrift::EntryCount {
                index: index.entry_count,
                derived: seq,
            }));
        }
        if let Some(comment_id) = entry.external_record_id() {
            create_json_atomic(
                &receipt_path(&self.root, seq),
                &PublicationReceipt { seq, comment_id },
            )?;
        }
        write_json_atomic(&self.root.join(INDEX_FILE), &index.with_entry(&entry).touched())?;

        info!(
            seq,
            event_id = entry.event_id(),
            hash = entry.hash().short(),
            "entry appended"
        );
        Ok(seq)
    }

    fn load_all(&self) -> Result<Vec<Entry>, StoreError> {
        let seqs = read_sequence_numbers(&self.root.join(ENTRIES_DIR))?;
        let entries = seqs
            .into_iter()
            .map(|seq| read_entry(&self.root, seq))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = entries.len(), root = %self.root.display(), "entries loaded");
        Ok(entries)
    }

    fn index(&self) -> Result<LedgerIndex, StoreError> {
        Ok(self.stored_index()?.unwrap_or_default())
    }

    fn repair_index(&mut self) -> Result<LedgerIndex, StoreError> {
        let _lock = self.lock()?;
        let index = derive_index(&self.load_all()?)?.touched();
        write_json_atomic(&self.root.join(INDEX_FILE), &index)?;
        info!(
            entries = index.entry_count,
            head = %index.head_hash,
            "index repaired"
        );
        Ok(index)
    }

    fn record_publication(
        &mut self,
        seq: u64,
        external_record_id: u64,
    ) -> Result<(), StoreError> {
        let _lock = self.lock()?;
        let entry = match seq {
            0 => return Err(StoreError::UnknownSequence(seq)),
            _ if !entry_path(&self.root, seq).exists() => {
                return Err(StoreError::UnknownSequence(seq))
            }
            _ => read_entry(&self.root, seq)?,
        };
        if let Some(existing) = entry.external_record_id() {
            return Err(StoreError::AlreadyPublished {
                seq,
                external_record_id: existing,
            });
        }
        let receipt = PublicationReceipt {
            seq,
            comment_id: external_record_id,
        };
        if !create_json_atomic(&receipt_path(&self.root, seq), &receipt)? {
            let existing: Option<PublicationReceipt> =
                read_optional_json(&receipt_path(&self.root, seq))?;
            return Err(StoreError::AlreadyPublished {
                seq,
                external_record_id: existing.map_or(external_record_id, |r| r.comment_id),
            });
        }
        info!(seq, external_record_id, "publication recorded");
        Ok(())
    }

    fn replace_all(&mut self, entries: Vec<Entry>) -> Result<LedgerIndex, StoreError> {
        check_unique_events(&entries)?;
        let index = derive_index(&entries)?.touched();

        let _lock = self.lock()?;
        let staging = self.sibling("staging");
        let backup = self.sibling("previous");
        remove_dir_if_exists(&staging)?;
        remove_dir_if_exists(&backup)?;
        Self::write_ledger(&staging, &entries, &index)?;
        for dir in [ENTRIES_DIR, RECEIPTS_DIR] {
            let path = staging.join(dir);
            fs::create_dir_all(&path)
                .map_err(|source| StoreError::WriteFailure { path, source })?;
        }

        rename_dir(&self.root, &backup)?;
        if let Err(swap) = fs::rename(&staging, &self.root) {
            return Err(roll_back_swap(&backup, &self.root, swap));
        }
        remove_dir_if_exists(&backup)?;

        info!(
            entries = index.entry_count,
            head = %index.head_hash,
            "ledger replaced"
        );
        Ok(index)
    }

    fn verify_index(&self) -> Result<(), StoreError> {
        check_index(self.stored_index()?.as_ref(), &self.load_all()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn failed_swap() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::Other, "staging rename failed")
    }

    #[test]
    fn rollback_restores_the_previous_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("ledger");
        let backup = dir.path().join(".ledger.previous");
        fs::create_dir(&backup).unwrap();

        let err = roll_back_swap(&backup, &root, failed_swap());
        assert!(matches!(err, StoreError::WriteFailure { .. }));
        assert!(root.is_dir());
        assert!(!backup.exists());
    }

    #[test]
    fn failed_rollback_reports_both_errors() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("ledger");
        let backup = dir.path().join(".ledger.previous");

        let err = roll_back_swap(&backup, &root, failed_swap());
        let message = err.to_string();
        assert!(matches!(err, StoreError::SwapRollbackFailed { .. }));
        assert!(message.contains("staging rename failed"));
        assert!(message.contains(".ledger.previous"));
    }

    #[test]
    fn lock_lives_beside_the_root() {
        let dir = TempDir::new().unwrap();
        let ledger = FileLedger::open(dir.path().join("ledger")).unwrap();
        assert_eq!(ledger.lock_path(), dir.path().join(".ledger.lock"));
        assert!(!ledger.lock_path().starts_with(ledger.root()));
    }
}
