//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level byte store for rootsdb.
///
/// Backends are **opaque byte stores**. The engine owns all format
/// interpretation - backends do not understand tables, index entries,
/// or undo records.
///
/// Two access shapes are provided:
///
/// - snapshot: [`read_all`](StorageBackend::read_all) /
///   [`replace`](StorageBackend::replace) for table files that are
///   rewritten whole on flush
/// - append-only: [`append`](StorageBackend::append) /
///   [`clear`](StorageBackend::clear) for the undo log
///
/// # Invariants
///
/// - `replace` swaps the entire contents atomically with respect to
///   process crashes: a reader sees either the old snapshot or the new
///   one, never a prefix
/// - `read_all` returns exactly the bytes of the last durable state
/// - after `sync` returns, all prior writes survive process termination
pub trait StorageBackend {
    /// Reads the entire current contents.
    fn read_all(&self) -> StorageResult<Vec<u8>>;

    /// Replaces the entire contents with `data`.
    ///
    /// The replacement must be atomic with respect to crashes.
    fn replace(&mut self, data: &[u8]) -> StorageResult<()>;

    /// Appends `data` to the end of the store.
    ///
    /// Returns the offset at which the data landed.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Removes all contents.
    fn clear(&mut self) -> StorageResult<()>;

    /// Forces all prior writes to durable storage.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current size in bytes.
    fn len(&self) -> StorageResult<u64>;

    /// Returns true if the store holds no bytes.
    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }
}
