//! In-memory storage backend for testing.

use crate::backend::StorageBackend;
use crate::error::StorageResult;

/// An in-memory storage backend.
///
/// Holds all bytes in a `Vec`. Nothing is ever durable; `sync` is a
/// no-op. Intended for tests and throwaway stores.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: Vec<u8>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-filled with `data`, as if a previous
    /// session had written it.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_all(&self) -> StorageResult<Vec<u8>> {
        Ok(self.data.clone())
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        self.data = data.to_vec();
        Ok(())
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let offset = self.data.len() as u64;
        self.data.extend_from_slice(data);
        Ok(offset)
    }

    fn clear(&mut self) -> StorageResult<()> {
        self.data.clear();
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn len(&self) -> StorageResult<u64> {
        Ok(self.data.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let backend = InMemoryBackend::new();
        assert!(backend.is_empty().unwrap());
    }

    #[test]
    fn replace_and_read() {
        let mut backend = InMemoryBackend::new();
        backend.replace(b"snapshot").unwrap();
        assert_eq!(backend.read_all().unwrap(), b"snapshot");

        backend.replace(b"next").unwrap();
        assert_eq!(backend.read_all().unwrap(), b"next");
    }

    #[test]
    fn append_returns_offsets() {
        let mut backend = InMemoryBackend::new();
        assert_eq!(backend.append(b"ab").unwrap(), 0);
        assert_eq!(backend.append(b"cd").unwrap(), 2);
        assert_eq!(backend.read_all().unwrap(), b"abcd");
    }

    #[test]
    fn clear_empties() {
        let mut backend = InMemoryBackend::with_data(vec![1, 2, 3]);
        assert_eq!(backend.len().unwrap(), 3);
        backend.clear().unwrap();
        assert!(backend.is_empty().unwrap());
    }
}
