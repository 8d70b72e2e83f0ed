//! The singleton process-metadata record.
//!
//! Created at first writable open, updated at close and at every
//! schema version bump, and flushed with every commit. Holds the
//! schema version, per-kind ID counters, bookmarks, and the derived
//! aggregates.

use crate::aggregates::GenderStats;
use crate::codec::{from_cbor, to_cbor};
use crate::error::StoreResult;
use crate::types::{GrampsId, Handle, ObjectKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The metadata record. One per store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Schema version of the on-disk tables.
    pub schema_version: u32,
    /// Next serial number per object kind, for engine-assigned IDs.
    id_counters: BTreeMap<String, u32>,
    /// Bookmarked handles per object kind.
    bookmarks: BTreeMap<String, Vec<Handle>>,
    /// Gender counts over the person table.
    pub gender_stats: GenderStats,
    /// Event-type names ever used by committed records. Append-only.
    pub event_types: BTreeSet<String>,
    /// Attribute names ever used by committed records. Append-only.
    pub attribute_names: BTreeSet<String>,
}

impl Metadata {
    /// Creates the metadata record for a brand-new store.
    #[must_use]
    pub fn new(schema_version: u32) -> Self {
        Self {
            schema_version,
            id_counters: BTreeMap::new(),
            bookmarks: BTreeMap::new(),
            gender_stats: GenderStats::default(),
            event_types: BTreeSet::new(),
            attribute_names: BTreeSet::new(),
        }
    }

    /// Encodes the record to CBOR.
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        to_cbor(self)
    }

    /// Decodes the record from CBOR.
    pub fn decode(data: &[u8]) -> StoreResult<Self> {
        from_cbor(data)
    }

    /// Hands out the next engine-assigned ID for a kind.
    ///
    /// The counter only moves forward; skipped IDs are never reissued.
    pub fn next_gramps_id(&mut self, kind: ObjectKind) -> GrampsId {
        let counter = self
            .id_counters
            .entry(kind.table_name().to_string())
            .or_insert(0);
        *counter += 1;
        GrampsId::formatted(kind, *counter)
    }

    /// Returns the bookmarked handles for a kind.
    #[must_use]
    pub fn bookmarks(&self, kind: ObjectKind) -> &[Handle] {
        self.bookmarks
            .get(kind.table_name())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Adds a bookmark if not already present.
    pub fn add_bookmark(&mut self, kind: ObjectKind, handle: Handle) {
        let list = self
            .bookmarks
            .entry(kind.table_name().to_string())
            .or_default();
        if !list.contains(&handle) {
            list.push(handle);
        }
    }

    /// Removes a bookmark. Returns true if it was present.
    pub fn remove_bookmark(&mut self, kind: ObjectKind, handle: Handle) -> bool {
        match self.bookmarks.get_mut(kind.table_name()) {
            Some(list) => {
                let before = list.len();
                list.retain(|h| *h != handle);
                list.len() != before
            }
            None => false,
        }
    }

    /// Records an event-type name as used. Never shrinks.
    pub fn note_event_type(&mut self, name: &str) {
        if !name.is_empty() && !self.event_types.contains(name) {
            self.event_types.insert(name.to_string());
        }
    }

    /// Records an attribute name as used. Never shrinks.
    pub fn note_attribute(&mut self, name: &str) {
        if !name.is_empty() && !self.attribute_names.contains(name) {
            self.attribute_names.insert(name.to_string());
        }
    }
}
