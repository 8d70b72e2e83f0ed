//! File-based storage backend for persistent storage.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A file-based storage backend.
///
/// Snapshot replacement uses the write-temp-then-rename pattern so a
/// crash mid-write leaves the previous snapshot intact. Appends go
/// straight to the end of the live file.
///
/// # Example
///
/// ```no_run
/// use rootsdb_storage::{FileBackend, StorageBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("person.tbl")).unwrap();
/// backend.replace(b"snapshot bytes").unwrap();
/// backend.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: File,
    size: u64,
}

impl FileBackend {
    /// Opens or creates a file backend at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            size,
        })
    }

    /// Opens an existing file backend; fails if the file is missing.
    pub fn open_existing(path: &Path) -> StorageResult<Self> {
        if !path.is_file() {
            return Err(StorageError::unavailable(format!(
                "no such file: {}",
                path.display()
            )));
        }
        Self::open(path)
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StorageBackend for FileBackend {
    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let mut file = File::open(&self.path)?;
        let mut data = Vec::with_capacity(self.size as usize);
        file.read_to_end(&mut data)?;
        Ok(data)
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        let temp = self.temp_path();

        // Write-then-rename keeps the old snapshot intact on crash.
        let mut tmp_file = File::create(&temp)?;
        tmp_file.write_all(data)?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        fs::rename(&temp, &self.path)?;

        self.file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)?;
        self.size = data.len() as u64;
        Ok(())
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let offset = self.size;
        if data.is_empty() {
            return Ok(offset);
        }
        self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(data)?;
        self.size += data.len() as u64;
        Ok(offset)
    }

    fn clear(&mut self) -> StorageResult<()> {
        self.file.set_len(0)?;
        self.file.sync_all()?;
        self.size = 0;
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.file.sync_all()?;
        Ok(())
    }

    fn len(&self) -> StorageResult<u64> {
        Ok(self.size)
    }
}
