//! Cursors: lazy, forward-only iteration over tables and indexes.
//!
//! A cursor borrows its table, so the borrow checker enforces the
//! lifecycle rule statically: every cursor must be released before the
//! table can be mutated, rebuilt, or closed. Cursors are finite and
//! not restartable once exhausted.

use crate::index::{IndexKey, IndexTable};
use crate::object::StoredObject;
use crate::table::Table;
use crate::types::Handle;
use std::collections::btree_map;
use std::collections::btree_set;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::ops::Bound::{Excluded, Unbounded};

/// A forward-only cursor over a primary table.
///
/// Yields `(handle, record)` pairs in handle order.
pub struct TableCursor<'a> {
    inner: btree_map::Iter<'a, Handle, StoredObject>,
}

impl<'a> TableCursor<'a> {
    /// Creates a cursor positioned before the first record.
    #[must_use]
    pub fn new(table: &'a Table) -> Self {
        Self {
            inner: table.entries().iter(),
        }
    }
}

impl<'a> Iterator for TableCursor<'a> {
    type Item = (Handle, &'a StoredObject);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(h, obj)| (*h, obj))
    }
}

/// A duplicate-key cursor over a secondary index.
///
/// Enumerates all handles stored under one key before advancing to the
/// next key: position with [`seek`](IndexCursor::seek) or
/// [`next_key`](IndexCursor::next_key), then drain the key's handles
/// with [`next_duplicate`](IndexCursor::next_duplicate).
pub struct IndexCursor<'a> {
    entries: &'a BTreeMap<IndexKey, BTreeSet<Handle>>,
    current: Option<(&'a IndexKey, btree_set::Iter<'a, Handle>)>,
    exhausted: bool,
}

impl<'a> IndexCursor<'a> {
    /// Creates a cursor positioned before the first key.
    #[must_use]
    pub fn new(index: &'a IndexTable) -> Self {
        Self {
            entries: index.entries(),
            current: None,
            exhausted: false,
        }
    }

    /// Positions the cursor at an exact key.
    ///
    /// Returns true if the key exists; on a miss the cursor position is
    /// unchanged.
    pub fn seek(&mut self, key: &IndexKey) -> bool {
        match self.entries.get_key_value(key) {
            Some((k, handles)) => {
                self.current = Some((k, handles.iter()));
                self.exhausted = false;
                true
            }
            None => false,
        }
    }

    /// Advances to the next key and returns it.
    ///
    /// Returns `None` once all keys are consumed; the cursor stays
    /// exhausted after that.
    pub fn next_key(&mut self) -> Option<&'a IndexKey> {
        if self.exhausted {
            return None;
        }
        let next = match &self.current {
            Some((key, _)) => self
                .entries
                .range::<IndexKey, _>((Excluded(*key), Unbounded))
                .next(),
            None => self.entries.iter().next(),
        };
        match next {
            Some((k, handles)) => {
                self.current = Some((k, handles.iter()));
                Some(k)
            }
            None => {
                self.current = None;
                self.exhausted = true;
                None
            }
        }
    }

    /// Returns the key the cursor is positioned at.
    #[must_use]
    pub fn key(&self) -> Option<&'a IndexKey> {
        self.current.as_ref().map(|(k, _)| *k)
    }

    /// Returns the next handle stored under the current key.
    pub fn next_duplicate(&mut self) -> Option<Handle> {
        self.current.as_mut()?.1.next().copied()
    }
}
