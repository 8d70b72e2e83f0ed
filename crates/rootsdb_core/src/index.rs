//! Secondary index manager.
//!
//! Each index is a derived table computed from primary records via a
//! typed extraction interface. On every primary put/delete the index
//! re-evaluates extraction and updates its entries in the same flush
//! unit as the primary write - index state never lags a commit.
//!
//! The only repair path is [`IndexTable::rebuild`]: drop everything and
//! recompute from a full primary-table scan. No incremental repair
//! exists.

use crate::codec::{map_field, value_from_cbor};
use crate::error::{StoreError, StoreResult};
use crate::object::StoredObject;
use crate::table::Table;
use crate::types::{Handle, ObjectKind};
use ciborium::value::Value;
use rootsdb_storage::StorageBackend;
use std::collections::{BTreeMap, BTreeSet};

/// Magic bytes for index snapshot files.
const INDEX_MAGIC: [u8; 4] = *b"RIDX";
/// Current snapshot format version.
const INDEX_FORMAT: u16 = 1;

/// A key derived from a record by an extractor.
///
/// Keys are compared by their byte representation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexKey(Vec<u8>);

impl IndexKey {
    /// Creates a key from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Returns the key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Renders the key for error messages, lossily.
    #[must_use]
    pub fn display_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl From<&str> for IndexKey {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for IndexKey {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

/// Typed extraction interface: derives zero or more index keys from a
/// stored record.
///
/// Registered per index at construction; replaces callback-style
/// extraction over unserialized blobs.
pub trait KeyExtractor {
    /// Extracts the index keys for a record.
    ///
    /// An empty result means the record simply has no entry under this
    /// index.
    fn extract(&self, obj: &StoredObject) -> Vec<IndexKey>;

    /// Extracts keys, surfacing a payload that could not be read.
    ///
    /// The default treats every record as readable. Extractors that
    /// parse the payload override this so a scan can tell "no keys"
    /// apart from "undecodable record" and log the latter.
    fn try_extract(&self, obj: &StoredObject) -> StoreResult<Vec<IndexKey>> {
        Ok(self.extract(obj))
    }
}

/// Extracts the envelope's Gramps-ID. Backs the per-kind unique ID
/// indexes.
#[derive(Debug, Clone, Copy)]
pub struct GrampsIdExtractor;

impl KeyExtractor for GrampsIdExtractor {
    fn extract(&self, obj: &StoredObject) -> Vec<IndexKey> {
        vec![IndexKey::from(obj.gramps_id.as_str())]
    }
}

/// Extracts text values found under a CBOR field path in the payload.
///
/// Maps are descended by key; arrays fan out, so one record can yield
/// several keys (a person with multiple surnames indexes under each).
/// Records whose payload is not CBOR, or has no value at the path,
/// yield no keys.
#[derive(Debug, Clone)]
pub struct FieldPathExtractor {
    path: Vec<String>,
}

impl FieldPathExtractor {
    /// Creates an extractor for the given field path.
    #[must_use]
    pub fn new(path: Vec<String>) -> Self {
        Self { path }
    }

    fn collect(value: &Value, path: &[String], out: &mut Vec<IndexKey>) {
        match (value, path.split_first()) {
            (Value::Text(text), None) => out.push(IndexKey::from(text.as_str())),
            (Value::Array(items), _) => {
                for item in items {
                    Self::collect(item, path, out);
                }
            }
            (map @ Value::Map(_), Some((head, rest))) => {
                if let Some(next) = map_field(map, head) {
                    Self::collect(next, rest, out);
                }
            }
            _ => {}
        }
    }
}

impl KeyExtractor for FieldPathExtractor {
    fn extract(&self, obj: &StoredObject) -> Vec<IndexKey> {
        self.try_extract(obj).unwrap_or_default()
    }

    fn try_extract(&self, obj: &StoredObject) -> StoreResult<Vec<IndexKey>> {
        let value = value_from_cbor(&obj.payload)?;
        let mut keys = Vec::new();
        Self::collect(&value, &self.path, &mut keys);
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}

/// A secondary index: derived table mapping extracted keys to handles.
pub struct IndexTable {
    name: String,
    source: ObjectKind,
    unique: bool,
    extractor: Box<dyn KeyExtractor>,
    entries: BTreeMap<IndexKey, BTreeSet<Handle>>,
    backend: Box<dyn StorageBackend>,
    dirty: bool,
}

impl IndexTable {
    /// Opens an index over a backend, loading any existing snapshot.
    pub fn open(
        name: impl Into<String>,
        source: ObjectKind,
        unique: bool,
        extractor: Box<dyn KeyExtractor>,
        backend: Box<dyn StorageBackend>,
    ) -> StoreResult<Self> {
        let data = backend.read_all()?;
        let entries = if data.is_empty() {
            BTreeMap::new()
        } else {
            Self::decode(&data)?
        };

        Ok(Self {
            name: name.into(),
            source,
            unique,
            extractor,
            entries,
            backend,
            dirty: false,
        })
    }

    /// Returns the index name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the source table's object kind.
    #[must_use]
    pub fn source(&self) -> ObjectKind {
        self.source
    }

    /// Returns true if this index enforces unique keys.
    #[must_use]
    pub fn unique(&self) -> bool {
        self.unique
    }

    /// Returns true if the index has no loaded entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if the index has unflushed changes.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Runs this index's extractor over a record.
    #[must_use]
    pub fn extract(&self, obj: &StoredObject) -> Vec<IndexKey> {
        self.extractor.extract(obj)
    }

    /// Checks whether inserting `obj` would violate uniqueness.
    ///
    /// Performed before any mutation so a rejected write leaves every
    /// table untouched.
    pub fn check_conflict(&self, obj: &StoredObject) -> StoreResult<()> {
        if !self.unique {
            return Ok(());
        }
        for key in self.extract(obj) {
            if let Some(handles) = self.entries.get(&key) {
                if handles.iter().any(|h| *h != obj.handle) {
                    return Err(StoreError::IndexConflict {
                        index: self.name.clone(),
                        key: key.display_lossy(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Replaces the entries for a record: removes the keys derived from
    /// `prior` (if any) and inserts the keys derived from `current`.
    pub fn update(&mut self, prior: Option<&StoredObject>, current: &StoredObject) {
        if let Some(old) = prior {
            self.remove(old);
        }
        for key in self.extract(current) {
            self.entries.entry(key).or_default().insert(current.handle);
            self.dirty = true;
        }
    }

    /// Removes all entries derived from a record.
    pub fn remove(&mut self, obj: &StoredObject) {
        for key in self.extract(obj) {
            if let Some(handles) = self.entries.get_mut(&key) {
                if handles.remove(&obj.handle) {
                    self.dirty = true;
                }
                if handles.is_empty() {
                    self.entries.remove(&key);
                }
            }
        }
    }

    /// Looks up the handles stored under a key.
    ///
    /// Unordered unless the index is unique.
    #[must_use]
    pub fn lookup(&self, key: &IndexKey) -> Vec<Handle> {
        match self.entries.get(key) {
            Some(handles) => handles.iter().copied().collect(),
            None => Vec::new(),
        }
    }

    /// Drops all entries and recomputes them from a full scan of the
    /// primary table.
    ///
    /// Records whose payload cannot be read are logged and skipped;
    /// the rebuild keeps going.
    pub fn rebuild(&mut self, table: &Table) {
        self.entries.clear();
        self.dirty = true;
        let mut skipped = 0usize;
        for (handle, obj) in table.iter() {
            let keys = match self.extractor.try_extract(obj) {
                Ok(keys) => keys,
                Err(err) => {
                    skipped += 1;
                    tracing::warn!(
                        index = %self.name,
                        %handle,
                        error = %err,
                        "skipping record with unreadable payload during rebuild"
                    );
                    continue;
                }
            };
            for key in keys {
                self.entries.entry(key).or_default().insert(handle);
            }
        }
        tracing::debug!(index = %self.name, entries = self.entries.len(), skipped, "index rebuilt");
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

    /// Exposes the entry map for cursor iteration.
    pub(crate) fn entries(&self) -> &BTreeMap<IndexKey, BTreeSet<Handle>> {
        &self.entries
    }

    fn encode(&self) -> StoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&INDEX_MAGIC);
        buf.extend_from_slice(&INDEX_FORMAT.to_le_bytes());

        let count = u32::try_from(self.entries.len())
            .map_err(|_| StoreError::codec("index key count exceeds the snapshot format"))?;
        buf.extend_from_slice(&count.to_le_bytes());

        for (key, handles) in &self.entries {
            let key_len = u16::try_from(key.as_bytes().len()).map_err(|_| {
                StoreError::codec(format!(
                    "index key of {} bytes exceeds the {}-byte limit",
                    key.as_bytes().len(),
                    u16::MAX
                ))
            })?;
            buf.extend_from_slice(&key_len.to_le_bytes());
            buf.extend_from_slice(key.as_bytes());

            let handle_count = u32::try_from(handles.len())
                .map_err(|_| StoreError::codec("index entry handle count exceeds the snapshot format"))?;
            buf.extend_from_slice(&handle_count.to_le_bytes());
            for handle in handles {
                buf.extend_from_slice(handle.as_bytes());
            }
        }
        Ok(buf)
    }

    fn decode(data: &[u8]) -> StoreResult<BTreeMap<IndexKey, BTreeSet<Handle>>> {
        if data.len() < 10 || data[0..4] != INDEX_MAGIC {
            return Err(StoreError::corrupt("invalid index magic"));
        }
        let format = u16::from_le_bytes([data[4], data[5]]);
        if format > INDEX_FORMAT {
            return Err(StoreError::corrupt(format!(
                "unsupported index format: {format}"
            )));
        }

        let count = u32::from_le_bytes([data[6], data[7], data[8], data[9]]) as usize;
        let mut cursor = 10;
        let mut entries = BTreeMap::new();

        for _ in 0..count {
            if cursor + 2 > data.len() {
                return Err(StoreError::corrupt("index truncated in key length"));
            }
            let key_len = u16::from_le_bytes([data[cursor], data[cursor + 1]]) as usize;
            cursor += 2;

            if cursor + key_len + 4 > data.len() {
                return Err(StoreError::corrupt("index truncated in key"));
            }
            let key = IndexKey::from_bytes(data[cursor..cursor + key_len].to_vec());
            cursor += key_len;

            let handle_count = u32::from_le_bytes([
                data[cursor],
                data[cursor + 1],
                data[cursor + 2],
                data[cursor + 3],
            ]) as usize;
            cursor += 4;

            let mut handles = BTreeSet::new();
            for _ in 0..handle_count {
                if cursor + 16 > data.len() {
                    return Err(StoreError::corrupt("index truncated in handle"));
                }
                let handle = Handle::from_slice(&data[cursor..cursor + 16])
                    .ok_or_else(|| StoreError::corrupt("index truncated in handle"))?;
                cursor += 16;
                handles.insert(handle);
            }
            entries.insert(key, handles);
        }
        Ok(entries)
    }
}

impl std::fmt::Debug for IndexTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexTable")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("unique", &self.unique)
            .field("keys", &self.entries.len())
            .finish_non_exhaustive()
    }
}
