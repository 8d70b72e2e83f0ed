//! Primary table store.
//!
//! One keyed table per object kind. Tables are fully cached in memory
//! (an ordered map keyed by handle) and mirrored to one snapshot file
//! through a [`StorageBackend`]. A flush rewrites the snapshot whole
//! and is atomic with respect to crashes.

use crate::error::{StoreError, StoreResult};
use crate::object::StoredObject;
use crate::types::{Handle, ObjectKind};
use rootsdb_storage::StorageBackend;
use std::collections::BTreeMap;

/// Magic bytes for table snapshot files.
const TABLE_MAGIC: [u8; 4] = *b"RTBL";
/// Current snapshot format version.
const TABLE_FORMAT: u16 = 1;

/// A primary table: handle-keyed records of one object kind.
pub struct Table {
    kind: ObjectKind,
    entries: BTreeMap<Handle, StoredObject>,
    backend: Box<dyn StorageBackend>,
    dirty: bool,
}

impl Table {
    /// Opens a table over a backend, loading the existing snapshot.
    ///
    /// An empty backend yields an empty table.
    pub fn open(kind: ObjectKind, backend: Box<dyn StorageBackend>) -> StoreResult<Self> {
        let data = backend.read_all()?;
        let entries = if data.is_empty() {
            BTreeMap::new()
        } else {
            Self::decode(kind, &data)?
        };

        Ok(Self {
            kind,
            entries,
            backend,
            dirty: false,
        })
    }

    /// Returns the object kind this table stores.
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Returns the record for a handle, if present.
    #[must_use]
    pub fn get(&self, handle: Handle) -> Option<&StoredObject> {
        self.entries.get(&handle)
    }

    /// Returns true if a handle names a record.
    #[must_use]
    pub fn contains(&self, handle: Handle) -> bool {
        self.entries.contains_key(&handle)
    }

    /// Inserts or replaces a record, returning the prior value.
    pub fn put(&mut self, obj: StoredObject) -> Option<StoredObject> {
        self.dirty = true;
        self.entries.insert(obj.handle, obj)
    }

    /// Deletes a record, returning the prior value.
    pub fn delete(&mut self, handle: Handle) -> Option<StoredObject> {
        let prior = self.entries.remove(&handle);
        if prior.is_some() {
            self.dirty = true;
        }
        prior
    }

    /// Iterates records in handle order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &StoredObject)> {
        self.entries.iter().map(|(h, obj)| (*h, obj))
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if the table has unflushed changes.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Exposes the entry map for cursor iteration.
    pub(crate) fn entries(&self) -> &BTreeMap<Handle, StoredObject> {
        &self.entries
    }

    /// Writes the snapshot out if dirty.
    pub fn flush(&mut self, sync: bool) -> StoreResult<()> {
        if !self.dirty {
            return Ok(());
        }
        let snapshot = self.encode()?;
        self.backend.replace(&snapshot)?;
        if sync {
            self.backend.sync()?;
        }
        self.dirty = false;
        Ok(())
    }

    fn encode(&self) -> StoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&TABLE_MAGIC);
        buf.extend_from_slice(&TABLE_FORMAT.to_le_bytes());
        buf.push(self.kind.as_u8());

        let count = u32::try_from(self.entries.len())
            .map_err(|_| StoreError::codec("table entry count exceeds the snapshot format"))?;
        buf.extend_from_slice(&count.to_le_bytes());

        for obj in self.entries.values() {
            obj.encode_into(&mut buf)?;
        }
        Ok(buf)
    }

    fn decode(kind: ObjectKind, data: &[u8]) -> StoreResult<BTreeMap<Handle, StoredObject>> {
        if data.len() < 11 || data[0..4] != TABLE_MAGIC {
            return Err(StoreError::corrupt("invalid table magic"));
        }
        let format = u16::from_le_bytes([data[4], data[5]]);
        if format > TABLE_FORMAT {
            return Err(StoreError::corrupt(format!(
                "unsupported table format: {format}"
            )));
        }
        let stored_kind = data[6];
        if stored_kind != kind.as_u8() {
            return Err(StoreError::corrupt(format!(
                "table kind mismatch: file says {stored_kind}, expected {kind}"
            )));
        }

        let count = u32::from_le_bytes([data[7], data[8], data[9], data[10]]) as usize;
        let mut cursor = 11;
        let mut entries = BTreeMap::new();
        for _ in 0..count {
            let obj = StoredObject::decode_from(data, &mut cursor)?;
            entries.insert(obj.handle, obj);
        }
        Ok(entries)
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("kind", &self.kind)
            .field("len", &self.len())
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}
