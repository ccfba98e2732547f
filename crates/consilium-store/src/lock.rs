use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::errors::StoreError;

/// Exclusive advisory lock on a ledger's lock file, released on drop.
#[derive(Debug)]
pub struct LedgerLock {
    file: File,
    path: PathBuf,
}

impl LedgerLock {
    /// Takes the lock without waiting; fails with [`StoreError::Locked`] if it is held.
    pub fn acquire(path: &Path) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|source| StoreError::WriteFailure {
                path: path.to_path_buf(),
                source,
            })?;
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                return Err(StoreError::Locked(path.to_path_buf()));
            }
            Err(source) => {
                return Err(StoreError::WriteFailure {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
        debug!(path = %path.display(), "ledger lock acquired");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!(path = %self.path.display(), "ledger lock released");
    }
}
