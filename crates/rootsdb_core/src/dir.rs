//! Store directory management.
//!
//! On-disk layout of an open store:
//!
//! ```text
//! <store_path>/
//! ├─ LOCK            # Advisory lock for single-writer
//! ├─ metadata.tbl    # Singleton metadata record (CBOR)
//! ├─ person.tbl      # One primary table per object kind
//! ├─ family.tbl
//! ├─ ...
//! ├─ person_id.idx   # One table per declared secondary index
//! ├─ person_surname.idx
//! ├─ ...
//! └─ undo.log        # Session undo log; exists only while open writable
//! ```

use crate::error::{StoreError, StoreResult};
use crate::types::ObjectKind;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const METADATA_FILE: &str = "metadata.tbl";
const UNDO_FILE: &str = "undo.log";

/// Manages the store directory and its advisory lock.
///
/// Holds an exclusive lock for the lifetime of the instance; multiple
/// handles against the same on-disk location are rejected rather than
/// left undefined.
#[derive(Debug)]
pub struct StoreDir {
    path: PathBuf,
    _lock_file: File,
}

impl StoreDir {
    /// Opens or creates a store directory.
    ///
    /// # Errors
    ///
    /// - the directory doesn't exist and `create_if_missing` is false
    /// - another process holds the lock ([`StoreError::Locked`])
    /// - I/O errors
    pub fn open(path: &Path, create_if_missing: bool) -> StoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(StoreError::Environment(
                    rootsdb_storage::StorageError::unavailable(format!(
                        "store directory does not exist: {}",
                        path.display()
                    )),
                ));
            }
        }

        if !path.is_dir() {
            return Err(StoreError::Environment(
                rootsdb_storage::StorageError::unavailable(format!(
                    "path is not a directory: {}",
                    path.display()
                )),
            ));
        }

        let lock_path = path.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the store directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the metadata table file.
    #[must_use]
    pub fn metadata_path(&self) -> PathBuf {
        self.path.join(METADATA_FILE)
    }

    /// Returns the path of a primary table file.
    #[must_use]
    pub fn table_path(&self, kind: ObjectKind) -> PathBuf {
        self.path.join(format!("{}.tbl", kind.table_name()))
    }

    /// Returns the path of a secondary index file.
    #[must_use]
    pub fn index_path(&self, index_name: &str) -> PathBuf {
        self.path.join(format!("{index_name}.idx"))
    }

    /// Returns the path of the session undo log.
    #[must_use]
    pub fn undo_path(&self) -> PathBuf {
        self.path.join(UNDO_FILE)
    }

    /// Removes the undo log file, if present.
    ///
    /// Called on clean close of a writable store.
    pub fn remove_undo_log(&self) -> StoreResult<()> {
        let path = self.undo_path();
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}
