//! Atomic file writes.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::errors::StoreError;

fn write_failure(path: &Path) -> impl Fn(io::Error) -> StoreError + '_ {
    move |source| StoreError::WriteFailure {
        path: path.to_path_buf(),
        source,
    }
}

// Serializes into a synced temp file next to `path`.
fn stage<T: Serialize>(path: &Path, value: &T) -> Result<NamedTempFile, StoreError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(write_failure(parent))?;

    let mut payload = serde_json::to_vec_pretty(value).map_err(|e| StoreError::Malformed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    payload.push(b'\n');

    let mut temp = NamedTempFile::new_in(parent).map_err(write_failure(parent))?;
    temp.write_all(&payload).map_err(write_failure(path))?;
    temp.as_file().sync_all().map_err(write_failure(path))?;
    Ok(temp)
}

/// Writes `value` as pretty JSON to `path` through a synced temp file and a rename.
///
/// Readers observe either the previous file or the complete new one.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    stage(path, value)?
        .persist(path)
        .map_err(|e| write_failure(path)(e.error))?;
    Ok(())
}

/// Like [`write_json_atomic`], but never replaces an existing file.
///
/// Returns `Ok(false)` when `path` already exists.
pub fn create_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<bool, StoreError> {
    match stage(path, value)?.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(write_failure(path)(e.error)),
    }
}
