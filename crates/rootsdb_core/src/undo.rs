//! Session undo log.
//!
//! Before any overwrite or delete, the previous value (or a delete
//! marker when no previous value existed) is appended here, tagged
//! with kind and handle. The log spans commits: it accumulates for the
//! life of the open writable store and supports multi-step undo across
//! several committed transactions. It is removed on clean close.

use crate::error::{StoreError, StoreResult};
use crate::object::StoredObject;
use crate::types::{Handle, ObjectKind};
use rootsdb_storage::StorageBackend;

/// One pre-image captured before a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoEntry {
    /// Kind of the mutated record.
    pub kind: ObjectKind,
    /// Handle of the mutated record.
    pub handle: Handle,
    /// The value before the mutation; `None` marks a record that did
    /// not exist (the mutation was an add).
    pub prior: Option<StoredObject>,
}

impl UndoEntry {
    fn encode(&self) -> StoreResult<Vec<u8>> {
        let mut body = Vec::new();
        body.push(self.kind.as_u8());
        body.extend_from_slice(self.handle.as_bytes());
        match &self.prior {
            Some(obj) => {
                body.push(1);
                obj.encode_into(&mut body)?;
            }
            None => body.push(0),
        }

        let mut buf = Vec::with_capacity(body.len() + 4);
        let len = u32::try_from(body.len())
            .map_err(|_| StoreError::codec("undo entry exceeds the log framing"))?;
        buf.extend_from_slice(&len.to_le_bytes());
        buf.extend_from_slice(&body);
        Ok(buf)
    }

    fn decode(body: &[u8]) -> StoreResult<Self> {
        if body.len() < 18 {
            return Err(StoreError::corrupt("undo entry too short"));
        }
        let kind = ObjectKind::from_u8(body[0])
            .ok_or_else(|| StoreError::corrupt(format!("unknown object kind: {}", body[0])))?;
        let handle = Handle::from_slice(&body[1..17])
            .ok_or_else(|| StoreError::corrupt("undo entry truncated in handle"))?;

        let prior = match body[17] {
            0 => None,
            1 => {
                let mut cursor = 18;
                Some(StoredObject::decode_from(body, &mut cursor)?)
            }
            flag => {
                return Err(StoreError::corrupt(format!(
                    "invalid undo prior flag: {flag}"
                )))
            }
        };

        Ok(Self {
            kind,
            handle,
            prior,
        })
    }
}

/// Append-only undo sequence, mirrored to a backend while open.
///
/// The in-memory entries are authoritative; the mirror exists so an
/// interrupted session leaves an inspectable trace on disk.
pub struct UndoLog {
    entries: Vec<UndoEntry>,
    backend: Option<Box<dyn StorageBackend>>,
}

impl UndoLog {
    /// Creates an empty session log mirrored to `backend`.
    ///
    /// Any stale mirror contents from an interrupted session are
    /// discarded; the log is session-scoped.
    pub fn open(mut backend: Box<dyn StorageBackend>) -> StoreResult<Self> {
        let stale = backend.read_all()?;
        if !stale.is_empty() {
            let count = Self::count_mirror_entries(&stale);
            tracing::warn!(entries = count, "discarding stale undo log from interrupted session");
            backend.clear()?;
        }
        Ok(Self {
            entries: Vec::new(),
            backend: Some(backend),
        })
    }

    fn count_mirror_entries(data: &[u8]) -> usize {
        let mut cursor = 0;
        let mut count = 0;
        while cursor + 4 <= data.len() {
            let len = u32::from_le_bytes([
                data[cursor],
                data[cursor + 1],
                data[cursor + 2],
                data[cursor + 3],
            ]) as usize;
            cursor += 4;
            if cursor + len > data.len() {
                break;
            }
            if UndoEntry::decode(&data[cursor..cursor + len]).is_ok() {
                count += 1;
            }
            cursor += len;
        }
        count
    }

    /// Creates a log with no mirror (read-only stores never undo).
    #[must_use]
    pub fn detached() -> Self {
        Self {
            entries: Vec::new(),
            backend: None,
        }
    }

    /// Appends a pre-image.
    pub fn push(&mut self, entry: UndoEntry) -> StoreResult<()> {
        if let Some(backend) = &mut self.backend {
            backend.append(&entry.encode()?)?;
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Pops the most recent pre-image.
    pub fn pop(&mut self) -> StoreResult<Option<UndoEntry>> {
        let entry = self.entries.pop();
        if entry.is_some() {
            self.rewrite_mirror()?;
        }
        Ok(entry)
    }

    /// Returns the number of undoable steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no steps remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Undo logs are session-sized; rewriting whole on pop is fine.
    fn rewrite_mirror(&mut self) -> StoreResult<()> {
        if let Some(backend) = &mut self.backend {
            let mut buf = Vec::new();
            for entry in &self.entries {
                buf.extend_from_slice(&entry.encode()?);
            }
            backend.replace(&buf)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for UndoLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UndoLog")
            .field("len", &self.entries.len())
            .field("mirrored", &self.backend.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GrampsId;
    use rootsdb_storage::InMemoryBackend;

    fn entry(prior: Option<StoredObject>) -> UndoEntry {
        UndoEntry {
            kind: ObjectKind::Person,
            handle: Handle::new(),
            prior,
        }
    }

    fn obj() -> StoredObject {
        StoredObject::new(Handle::new(), GrampsId::new("I0001"), vec![1, 2, 3])
    }

    #[test]
    fn push_pop_is_lifo() {
        let mut log = UndoLog::open(Box::new(InMemoryBackend::new())).unwrap();
        let first = entry(None);
        let second = entry(Some(obj()));

        log.push(first.clone()).unwrap();
        log.push(second.clone()).unwrap();
        assert_eq!(log.len(), 2);

        assert_eq!(log.pop().unwrap(), Some(second));
        assert_eq!(log.pop().unwrap(), Some(first));
        assert_eq!(log.pop().unwrap(), None);
    }

    #[test]
    fn open_discards_stale_mirror() {
        let backend = InMemoryBackend::with_data(b"stale session".to_vec());
        let log = UndoLog::open(Box::new(backend)).unwrap();
        assert!(log.is_empty());
    }

    #[test]
    fn detached_log_works_in_memory() {
        let mut log = UndoLog::detached();
        log.push(entry(None)).unwrap();
        assert_eq!(log.len(), 1);
        assert!(log.pop().unwrap().is_some());
    }

    #[test]
    fn entry_roundtrip_with_prior() {
        let original = entry(Some(obj()));
        let encoded = original.encode().unwrap();
        let decoded = UndoEntry::decode(&encoded[4..]).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn entry_roundtrip_delete_marker() {
        let original = entry(None);
        let encoded = original.encode().unwrap();
        let decoded = UndoEntry::decode(&encoded[4..]).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(UndoEntry::decode(&[]).is_err());
        assert!(UndoEntry::decode(&[9u8; 18]).is_err());
    }
}
