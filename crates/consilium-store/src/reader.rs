//! On-disk layout and reads.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use consilium_core::{Entry, EntryRecord};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::StoreError;

/// Directory holding one file per entry.
pub const ENTRIES_DIR: &str = "entries";
/// Directory holding publication receipts.
pub const RECEIPTS_DIR: &str = "receipts";
/// Derived index file.
pub const INDEX_FILE: &str = "index.json";

/// File name for sequence number `seq` (`0001.json`).
pub fn sequence_file_name(seq: u64) -> String {
    format!("{:04}.json", seq)
}

fn parse_sequence(name: &str) -> Option<u64> {
    let stem = name.strip_suffix(".json")?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

/// Comment id learned after an entry was published.
///
/// Written once, next to the entry, so the entry file itself never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationReceipt {
    /// Sequence number of the entry.
    pub seq: u64,
    /// External record id.
    pub comment_id: u64,
}

/// Sequence numbers present in `dir`, ascending and checked for gaps.
///
/// Order comes from the numbers in the file names, never from timestamps.
/// A missing directory is an empty ledger.
pub fn read_sequence_numbers(dir: &Path) -> Result<Vec<u64>, StoreError> {
    let read_failure = |source| StoreError::ReadFailure {
        path: dir.to_path_buf(),
        source,
    };
    let listing = match fs::read_dir(dir) {
        Ok(listing) => listing,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(read_failure(e)),
    };

    let mut seqs = Vec::new();
    for item in listing {
        let item = item.map_err(read_failure)?;
        if let Some(seq) = item.file_name().to_str().and_then(parse_sequence) {
            seqs.push(seq);
        }
    }
    seqs.sort_unstable();

    for (i, seq) in seqs.iter().enumerate() {
        let expected = i as u64 + 1;
        if *seq != expected {
            return Err(StoreError::SequenceGap {
                expected,
                found: *seq,
            });
        }
    }
    Ok(seqs)
}

/// Reads and parses a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let bytes = fs::read(path).map_err(|source| StoreError::ReadFailure {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|e| StoreError::Malformed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Like [`read_json`], but a missing file is `None`.
pub fn read_optional_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }
    read_json(path).map(Some)
}

/// Reads one entry file and applies its publication receipt, if any.
pub fn read_entry(root: &Path, seq: u64) -> Result<Entry, StoreError> {
    let record: EntryRecord = read_json(&entry_path(root, seq))?;
    let entry = Entry::try_from(record)?;
    let receipt: Option<PublicationReceipt> = read_optional_json(&receipt_path(root, seq))?;
    Ok(match receipt {
        Some(receipt) => entry.with_external_record_id(receipt.comment_id),
        None => entry,
    })
}

/// Path of entry `seq` under `root`.
pub fn entry_path(root: &Path, seq: u64) -> PathBuf {
    root.join(ENTRIES_DIR).join(sequence_file_name(seq))
}

/// Path of the receipt for entry `seq` under `root`.
pub fn receipt_path(root: &Path, seq: u64) -> PathBuf {
    root.join(RECEIPTS_DIR).join(sequence_file_name(seq))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_names_are_zero_padded() {
        assert_eq!(sequence_file_name(1), "0001.json");
        assert_eq!(sequence_file_name(12345), "12345.json");
        assert_eq!(parse_sequence("0042.json"), Some(42));
        assert_eq!(parse_sequence(".tmpAbC"), None);
        assert_eq!(parse_sequence("notes.json"), None);
    }

    #[test]
    fn orders_numerically_not_lexically() {
        let dir = TempDir::new().unwrap();
        for seq in [2u64, 3] {
            fs::write(dir.path().join(sequence_file_name(seq)), b"{}").unwrap();
        }
        assert!(matches!(
            read_sequence_numbers(dir.path()),
            Err(StoreError::SequenceGap { expected: 1, found: 2 })
        ));

        let dir = TempDir::new().unwrap();
        for seq in [10u64, 2, 1, 9, 3, 4, 5, 6, 7, 8] {
            fs::write(dir.path().join(sequence_file_name(seq)), b"{}").unwrap();
        }
        assert_eq!(
            read_sequence_numbers(dir.path()).unwrap(),
            (1..=10).collect::<Vec<_>>()
        );
    }

    #[test]
    fn missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(read_sequence_numbers(&dir.path().join("absent"))
            .unwrap()
            .is_empty());
    }
}
