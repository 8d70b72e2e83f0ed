//! The store facade.
//!
//! A [`Store`] owns one primary table per object kind, the registered
//! secondary indexes, the singleton metadata record, and the session
//! undo log, all behind a single exclusive handle. Mutations happen
//! inside labeled transactions; reads do not require one.
//!
//! Closing is explicit via [`Store::close`], which consumes the
//! handle. Dropping an open store closes it best-effort.

use crate::aggregates::{attribute_names_of, event_type_of, gender_of, GenderStats};
use crate::config::Config;
use crate::cursor::{IndexCursor, TableCursor};
use crate::dir::StoreDir;
use crate::error::{StoreError, StoreResult};
use crate::index::{
    FieldPathExtractor, GrampsIdExtractor, IndexKey, IndexTable, KeyExtractor,
};
use crate::metadata::Metadata;
use crate::migration::{version_supported, UpgradeChain, LATEST_VERSION};
use crate::object::{NewObject, StoredObject};
use crate::table::Table;
use crate::types::{GrampsId, Handle, ObjectKind};
use crate::undo::{UndoEntry, UndoLog};
use rootsdb_storage::{FileBackend, InMemoryBackend, StorageBackend};
use std::collections::BTreeSet;
use std::path::Path;

/// Access mode of an open store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Reads only; every mutating call fails.
    ReadOnly,
    /// Full access.
    ReadWrite,
}

struct ActiveTransaction {
    label: String,
    undo_mark: usize,
}

struct IndexDecl {
    name: String,
    source: ObjectKind,
    unique: bool,
    extractor: Box<dyn KeyExtractor>,
}

macro_rules! object_api {
    ($kind:ident, $noun:literal, $get:ident, $get_by_id:ident, $iter:ident, $cursor:ident,
     $add:ident, $commit:ident, $remove:ident) => {
        #[doc = concat!("Returns the ", $noun, " record with the given handle.")]
        pub fn $get(&self, handle: Handle) -> StoreResult<&StoredObject> {
            self.get_object(ObjectKind::$kind, handle)
        }

        #[doc = concat!("Returns the ", $noun, " record with the given Gramps-ID.")]
        pub fn $get_by_id(&self, id: &GrampsId) -> StoreResult<&StoredObject> {
            self.get_object_by_id(ObjectKind::$kind, id)
        }

        #[doc = concat!("Iterates all ", $noun, " handles, in handle order.")]
        pub fn $iter(&self) -> impl Iterator<Item = Handle> + '_ {
            self.iter_handles(ObjectKind::$kind)
        }

        #[doc = concat!("Opens a cursor over all ", $noun, " records, in handle order.")]
        pub fn $cursor(&self) -> TableCursor<'_> {
            self.object_cursor(ObjectKind::$kind)
        }

        #[doc = concat!("Adds a new ", $noun, " record, returning its handle.")]
        pub fn $add(&mut self, new: NewObject) -> StoreResult<Handle> {
            self.add_object(ObjectKind::$kind, new)
        }

        #[doc = concat!("Updates an existing ", $noun, " record.")]
        pub fn $commit(&mut self, obj: StoredObject) -> StoreResult<()> {
            self.commit_object(ObjectKind::$kind, obj)
        }

        #[doc = concat!("Removes a ", $noun, " record.")]
        pub fn $remove(&mut self, handle: Handle) -> StoreResult<()> {
            self.remove_object(ObjectKind::$kind, handle)
        }
    };
}

/// An open object store.
pub struct Store {
    mode: Mode,
    config: Config,
    dir: Option<StoreDir>,
    metadata: Metadata,
    metadata_backend: Box<dyn StorageBackend>,
    // One table per ObjectKind, in ObjectKind::ALL order.
    tables: Vec<Table>,
    indexes: Vec<IndexTable>,
    undo: UndoLog,
    txn: Option<ActiveTransaction>,
    closed: bool,
}

impl Store {
    /// Opens a writable store with default configuration, creating it
    /// if missing.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with_config(path, Mode::ReadWrite, Config::default())
    }

    /// Opens an existing store read-only.
    pub fn open_read_only(path: &Path) -> StoreResult<Self> {
        Self::open_with_config(path, Mode::ReadOnly, Config::default())
    }

    /// Opens a store with explicit mode and configuration.
    pub fn open_with_config(path: &Path, mode: Mode, config: Config) -> StoreResult<Self> {
        let writable = matches!(mode, Mode::ReadWrite);
        let dir = StoreDir::open(path, writable && config.create_if_missing)?;

        let mut metadata_backend: Box<dyn StorageBackend> = if writable {
            Box::new(FileBackend::open(&dir.metadata_path())?)
        } else {
            Box::new(FileBackend::open_existing(&dir.metadata_path())?)
        };

        let raw = metadata_backend.read_all()?;
        let metadata = if raw.is_empty() {
            if !writable {
                return Err(StoreError::corrupt("metadata record missing"));
            }
            let meta = Metadata::new(LATEST_VERSION);
            metadata_backend.replace(&meta.encode()?)?;
            meta
        } else {
            Metadata::decode(&raw)?
        };

        if !version_supported(metadata.schema_version) {
            return Err(StoreError::UnsupportedVersion {
                stored: metadata.schema_version,
                latest: LATEST_VERSION,
            });
        }

        let mut tables = Vec::with_capacity(ObjectKind::ALL.len());
        for kind in ObjectKind::ALL {
            let backend = Self::data_backend(&dir.table_path(kind), writable)?;
            tables.push(Table::open(kind, backend)?);
        }

        let mut indexes = Vec::new();
        for decl in Self::default_indexes() {
            let backend = Self::data_backend(&dir.index_path(&decl.name), writable)?;
            let mut index =
                IndexTable::open(decl.name, decl.source, decl.unique, decl.extractor, backend)?;
            let table = &tables[decl.source.as_u8() as usize];
            if index.is_empty() && !table.is_empty() {
                index.rebuild(table);
            }
            indexes.push(index);
        }

        let undo = if writable {
            UndoLog::open(Box::new(FileBackend::open(&dir.undo_path())?))?
        } else {
            UndoLog::detached()
        };

        tracing::info!(
            path = %dir.path().display(),
            ?mode,
            version = metadata.schema_version,
            "store opened"
        );

        Ok(Self {
            mode,
            config,
            dir: Some(dir),
            metadata,
            metadata_backend,
            tables,
            indexes,
            undo,
            txn: None,
            closed: false,
        })
    }

    /// Opens a writable store backed entirely by memory. Nothing
    /// persists past the handle.
    pub fn open_in_memory() -> StoreResult<Self> {
        let mut tables = Vec::with_capacity(ObjectKind::ALL.len());
        for kind in ObjectKind::ALL {
            tables.push(Table::open(kind, Box::new(InMemoryBackend::new()))?);
        }

        let mut indexes = Vec::new();
        for decl in Self::default_indexes() {
            indexes.push(IndexTable::open(
                decl.name,
                decl.source,
                decl.unique,
                decl.extractor,
                Box::new(InMemoryBackend::new()),
            )?);
        }

        Ok(Self {
            mode: Mode::ReadWrite,
            config: Config::default().sync_on_commit(false),
            dir: None,
            metadata: Metadata::new(LATEST_VERSION),
            metadata_backend: Box::new(InMemoryBackend::new()),
            tables,
            indexes,
            undo: UndoLog::open(Box::new(InMemoryBackend::new()))?,
            txn: None,
            closed: false,
        })
    }

    fn data_backend(path: &Path, writable: bool) -> StoreResult<Box<dyn StorageBackend>> {
        if writable {
            Ok(Box::new(FileBackend::open(path)?))
        } else if path.is_file() {
            Ok(Box::new(FileBackend::open_existing(path)?))
        } else {
            // A store written before this table or index was declared
            // simply has no file yet; read-only opens treat it as empty
            // rather than creating one.
            Ok(Box::new(InMemoryBackend::new()))
        }
    }

    /// The declared indexes: one unique Gramps-ID index per kind, plus
    /// the surname index over persons.
    fn default_indexes() -> Vec<IndexDecl> {
        let mut decls = Vec::new();
        for kind in ObjectKind::ALL {
            decls.push(IndexDecl {
                name: format!("{}_id", kind.table_name()),
                source: kind,
                unique: true,
                extractor: Box::new(GrampsIdExtractor),
            });
        }
        decls.push(IndexDecl {
            name: "person_surname".to_string(),
            source: ObjectKind::Person,
            unique: false,
            extractor: Box::new(FieldPathExtractor::new(vec!["surname".into()])),
        });
        decls
    }

    // ------------------------------------------------------------------
    // Introspection

    /// Returns the access mode.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Returns true if every mutating call will be rejected.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        matches!(self.mode, Mode::ReadOnly)
    }

    /// Returns the schema version of the open store.
    #[must_use]
    pub fn schema_version(&self) -> u32 {
        self.metadata.schema_version
    }

    /// Returns the store directory path, if file-backed.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(StoreDir::path)
    }

    /// Returns true if a transaction is active.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.txn.is_some()
    }

    /// Returns the number of undoable steps accumulated this session.
    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    /// Returns the number of records of a kind.
    #[must_use]
    pub fn object_count(&self, kind: ObjectKind) -> usize {
        self.tables[kind.as_u8() as usize].len()
    }

    /// Returns the gender counts over the person table.
    #[must_use]
    pub fn gender_stats(&self) -> GenderStats {
        self.metadata.gender_stats
    }

    /// Returns every event-type name ever used by a committed record.
    #[must_use]
    pub fn event_types(&self) -> &BTreeSet<String> {
        &self.metadata.event_types
    }

    /// Returns every attribute name ever used by a committed record.
    #[must_use]
    pub fn attribute_names(&self) -> &BTreeSet<String> {
        &self.metadata.attribute_names
    }

    // ------------------------------------------------------------------
    // Reads

    /// Returns the record of a kind with the given handle.
    pub fn get_object(&self, kind: ObjectKind, handle: Handle) -> StoreResult<&StoredObject> {
        self.tables[kind.as_u8() as usize]
            .get(handle)
            .ok_or(StoreError::NotFound { kind, handle })
    }

    /// Returns the record of a kind with the given Gramps-ID, resolved
    /// through the kind's unique ID index.
    pub fn get_object_by_id(&self, kind: ObjectKind, id: &GrampsId) -> StoreResult<&StoredObject> {
        let name = format!("{}_id", kind.table_name());
        let handles = self.index(&name)?.lookup(&IndexKey::from(id.as_str()));
        let handle = handles.first().copied().ok_or_else(|| StoreError::IdNotFound {
            kind,
            id: id.clone(),
        })?;
        self.get_object(kind, handle)
    }

    /// Iterates all handles of a kind lazily, in handle order.
    pub fn iter_handles(&self, kind: ObjectKind) -> impl Iterator<Item = Handle> + '_ {
        self.tables[kind.as_u8() as usize].iter().map(|(h, _)| h)
    }

    /// Opens a cursor over a primary table.
    #[must_use]
    pub fn object_cursor(&self, kind: ObjectKind) -> TableCursor<'_> {
        TableCursor::new(&self.tables[kind.as_u8() as usize])
    }

    /// Looks up the handles an index stores under a key.
    pub fn lookup_by_index(&self, index: &str, key: &IndexKey) -> StoreResult<Vec<Handle>> {
        Ok(self.index(index)?.lookup(key))
    }

    /// Opens a duplicate-key cursor over an index.
    pub fn index_cursor(&self, index: &str) -> StoreResult<IndexCursor<'_>> {
        Ok(IndexCursor::new(self.index(index)?))
    }

    fn index(&self, name: &str) -> StoreResult<&IndexTable> {
        self.indexes
            .iter()
            .find(|i| i.name() == name)
            .ok_or_else(|| StoreError::UnknownIndex {
                name: name.to_string(),
            })
    }

    // ------------------------------------------------------------------
    // Transactions

    /// Begins a labeled transaction.
    ///
    /// The label is carried for logging and undo bookkeeping only; it
    /// does not affect semantics.
    pub fn begin_transaction(&mut self, label: impl Into<String>) -> StoreResult<()> {
        self.require_writable("begin_transaction")?;
        if self.txn.is_some() {
            return Err(StoreError::TransactionActive);
        }
        let label = label.into();
        tracing::debug!(label = %label, "transaction begun");
        self.txn = Some(ActiveTransaction {
            label,
            undo_mark: self.undo.len(),
        });
        Ok(())
    }

    /// Commits the active transaction, flushing every dirty table,
    /// index, and the metadata record.
    pub fn commit(&mut self) -> StoreResult<()> {
        let txn = self.txn.take().ok_or(StoreError::NoTransaction)?;
        self.flush_all()?;
        tracing::debug!(label = %txn.label, "transaction committed");
        Ok(())
    }

    /// Aborts the active transaction, rolling back every mutation made
    /// since it began.
    pub fn abort(&mut self) -> StoreResult<()> {
        let txn = self.txn.take().ok_or(StoreError::NoTransaction)?;
        while self.undo.len() > txn.undo_mark {
            if let Some(entry) = self.undo.pop()? {
                self.apply_undo(entry);
            }
        }
        tracing::debug!(label = %txn.label, "transaction aborted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Mutations

    /// Adds a new record, returning its handle.
    ///
    /// Absent keys are assigned: a fresh random handle, and the next
    /// free Gramps-ID for the kind.
    pub fn add_object(&mut self, kind: ObjectKind, new: NewObject) -> StoreResult<Handle> {
        self.require_txn("add_object")?;

        let handle = new.handle.unwrap_or_default();
        if self.tables[kind.as_u8() as usize].contains(handle) {
            return Err(StoreError::HandleInUse { kind, handle });
        }
        let gramps_id = match new.gramps_id {
            Some(id) => id,
            // Counter advances even if the add is later rejected; IDs
            // are never reissued.
            None => self.metadata.next_gramps_id(kind),
        };
        let obj = StoredObject::new(handle, gramps_id, new.payload);
        obj.check_sizes()?;

        for index in self.indexes.iter().filter(|i| i.source() == kind) {
            index.check_conflict(&obj)?;
        }

        self.undo.push(UndoEntry {
            kind,
            handle,
            prior: None,
        })?;
        for index in self.indexes.iter_mut().filter(|i| i.source() == kind) {
            index.update(None, &obj);
        }
        self.apply_aggregates(kind, None, Some(&obj));
        self.tables[kind.as_u8() as usize].put(obj);
        Ok(handle)
    }

    /// Updates an existing record in place.
    pub fn commit_object(&mut self, kind: ObjectKind, obj: StoredObject) -> StoreResult<()> {
        self.require_txn("commit_object")?;

        let prior = self.tables[kind.as_u8() as usize]
            .get(obj.handle)
            .cloned()
            .ok_or(StoreError::NotFound {
                kind,
                handle: obj.handle,
            })?;
        obj.check_sizes()?;

        for index in self.indexes.iter().filter(|i| i.source() == kind) {
            index.check_conflict(&obj)?;
        }

        self.undo.push(UndoEntry {
            kind,
            handle: obj.handle,
            prior: Some(prior.clone()),
        })?;
        for index in self.indexes.iter_mut().filter(|i| i.source() == kind) {
            index.update(Some(&prior), &obj);
        }
        self.apply_aggregates(kind, Some(&prior), Some(&obj));
        self.tables[kind.as_u8() as usize].put(obj);
        Ok(())
    }

    /// Removes a record.
    pub fn remove_object(&mut self, kind: ObjectKind, handle: Handle) -> StoreResult<()> {
        self.require_txn("remove_object")?;

        let prior = self.tables[kind.as_u8() as usize]
            .get(handle)
            .cloned()
            .ok_or(StoreError::NotFound { kind, handle })?;

        self.undo.push(UndoEntry {
            kind,
            handle,
            prior: Some(prior.clone()),
        })?;
        for index in self.indexes.iter_mut().filter(|i| i.source() == kind) {
            index.remove(&prior);
        }
        self.apply_aggregates(kind, Some(&prior), None);
        self.tables[kind.as_u8() as usize].delete(handle);
        Ok(())
    }

    object_api!(Person, "person", get_person, get_person_by_id, iter_person_handles,
        person_cursor, add_person, commit_person, remove_person);
    object_api!(Family, "family", get_family, get_family_by_id, iter_family_handles,
        family_cursor, add_family, commit_family, remove_family);
    object_api!(Event, "event", get_event, get_event_by_id, iter_event_handles,
        event_cursor, add_event, commit_event, remove_event);
    object_api!(Place, "place", get_place, get_place_by_id, iter_place_handles,
        place_cursor, add_place, commit_place, remove_place);
    object_api!(Source, "source", get_source, get_source_by_id, iter_source_handles,
        source_cursor, add_source, commit_source, remove_source);
    object_api!(Media, "media", get_media, get_media_by_id, iter_media_handles,
        media_cursor, add_media, commit_media, remove_media);
    object_api!(Note, "note", get_note, get_note_by_id, iter_note_handles,
        note_cursor, add_note, commit_note, remove_note);

    // ------------------------------------------------------------------
    // Undo

    /// Undoes the most recent mutation of the session, across commit
    /// boundaries. Returns whether more undoable steps remain; an
    /// empty history is a no-op returning false.
    ///
    /// The restored state is flushed immediately.
    pub fn undo(&mut self) -> StoreResult<bool> {
        self.require_writable("undo")?;
        if self.txn.is_some() {
            return Err(StoreError::TransactionActive);
        }
        let Some(entry) = self.undo.pop()? else {
            return Ok(false);
        };
        self.apply_undo(entry);
        self.flush_all()?;
        Ok(!self.undo.is_empty())
    }

    /// Undoes every mutation made this session, then closes the store.
    ///
    /// Any active transaction is discarded along the way; there is no
    /// targeted rollback of one historical transaction once later ones
    /// have committed.
    pub fn abort_changes(mut self) -> StoreResult<()> {
        self.require_writable("abort_changes")?;
        self.txn = None;
        while let Some(entry) = self.undo.pop()? {
            self.apply_undo(entry);
        }
        tracing::debug!("session changes aborted");
        self.close_inner()
    }

    /// Reverts one mutation without recording a new undo entry.
    fn apply_undo(&mut self, entry: UndoEntry) {
        let slot = entry.kind.as_u8() as usize;
        let current = self.tables[slot].get(entry.handle).cloned();
        match entry.prior {
            // The mutation was an add; take the record back out.
            None => {
                if let Some(cur) = &current {
                    for index in self.indexes.iter_mut().filter(|i| i.source() == entry.kind) {
                        index.remove(cur);
                    }
                    self.apply_aggregates(entry.kind, Some(cur), None);
                    self.tables[slot].delete(entry.handle);
                }
            }
            // The mutation was an update or a remove; put the old
            // value back.
            Some(old) => {
                for index in self.indexes.iter_mut().filter(|i| i.source() == entry.kind) {
                    index.update(current.as_ref(), &old);
                }
                self.apply_aggregates(entry.kind, current.as_ref(), Some(&old));
                self.tables[slot].put(old);
            }
        }
    }

    // ------------------------------------------------------------------
    // Aggregates

    /// Adjusts the derived aggregates for one record transition.
    ///
    /// Gender counts move both ways; the vocabularies only grow.
    fn apply_aggregates(
        &mut self,
        kind: ObjectKind,
        prior: Option<&StoredObject>,
        current: Option<&StoredObject>,
    ) {
        match kind {
            ObjectKind::Person => {
                if let Some(old) = prior {
                    self.metadata.gender_stats.remove(gender_of(&old.payload));
                }
                if let Some(new) = current {
                    self.metadata.gender_stats.add(gender_of(&new.payload));
                    for name in attribute_names_of(&new.payload) {
                        self.metadata.note_attribute(&name);
                    }
                }
            }
            ObjectKind::Event => {
                if let Some(new) = current {
                    if let Some(name) = event_type_of(&new.payload) {
                        self.metadata.note_event_type(&name);
                    }
                }
            }
            _ => {}
        }
    }

    fn rebuild_aggregates(&mut self) {
        let persons = &self.tables[ObjectKind::Person.as_u8() as usize];
        self.metadata
            .gender_stats
            .rebuild(persons.iter().map(|(_, obj)| gender_of(&obj.payload)));
        for (_, obj) in persons.iter() {
            for name in attribute_names_of(&obj.payload) {
                self.metadata.note_attribute(&name);
            }
        }

        let events = &self.tables[ObjectKind::Event.as_u8() as usize];
        for (_, obj) in events.iter() {
            if let Some(name) = event_type_of(&obj.payload) {
                self.metadata.note_event_type(&name);
            }
        }
    }

    // ------------------------------------------------------------------
    // Bookmarks

    /// Returns the bookmarked handles of a kind, in insertion order.
    #[must_use]
    pub fn bookmarks(&self, kind: ObjectKind) -> &[Handle] {
        self.metadata.bookmarks(kind)
    }

    /// Bookmarks a record. The record must exist.
    pub fn add_bookmark(&mut self, kind: ObjectKind, handle: Handle) -> StoreResult<()> {
        self.require_writable("add_bookmark")?;
        if !self.tables[kind.as_u8() as usize].contains(handle) {
            return Err(StoreError::NotFound { kind, handle });
        }
        self.metadata.add_bookmark(kind, handle);
        self.flush_metadata()
    }

    /// Drops a bookmark. Returns true if it was present.
    pub fn remove_bookmark(&mut self, kind: ObjectKind, handle: Handle) -> StoreResult<bool> {
        self.require_writable("remove_bookmark")?;
        let removed = self.metadata.remove_bookmark(kind, handle);
        if removed {
            self.flush_metadata()?;
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Index maintenance

    /// Drops and recomputes one index from a full scan of its primary
    /// table. The only repair path for a damaged index.
    pub fn rebuild_index(&mut self, name: &str) -> StoreResult<()> {
        self.require_writable("rebuild_index")?;
        let tables = &self.tables;
        let index = self
            .indexes
            .iter_mut()
            .find(|i| i.name() == name)
            .ok_or_else(|| StoreError::UnknownIndex {
                name: name.to_string(),
            })?;
        index.rebuild(&tables[index.source().as_u8() as usize]);
        Ok(())
    }

    fn rebuild_all_indexes(&mut self) {
        let tables = &self.tables;
        for index in self.indexes.iter_mut() {
            index.rebuild(&tables[index.source().as_u8() as usize]);
        }
    }

    // ------------------------------------------------------------------
    // Migration

    /// Returns true if the stored schema version is older than this
    /// engine's latest and the store is writable.
    ///
    /// A read-only handle cannot upgrade, so it never reports the need.
    #[must_use]
    pub fn needs_upgrade(&self) -> bool {
        self.metadata.schema_version < LATEST_VERSION && !self.is_read_only()
    }

    /// Runs the upgrade chain from the stored version to the latest.
    ///
    /// The stored version is bumped only after each step's table has
    /// been flushed, so an interrupted upgrade restarts at the step
    /// that did not finish. Derived state is recomputed whole at the
    /// end, since steps change payload shapes.
    pub fn upgrade(&mut self) -> StoreResult<()> {
        self.require_writable("upgrade")?;
        if self.txn.is_some() {
            return Err(StoreError::TransactionActive);
        }

        let from = self.metadata.schema_version;
        let chain = UpgradeChain::builtin();
        for step in chain.steps_from(from) {
            let slot = step.kind().as_u8() as usize;
            UpgradeChain::run_step(step, &mut self.tables[slot])?;
            self.tables[slot].flush(self.config.sync_on_commit)?;
            self.metadata.schema_version = step.target_version();
            self.flush_metadata()?;
        }

        if from != self.metadata.schema_version {
            self.rebuild_all_indexes();
            self.rebuild_aggregates();
            self.flush_all()?;
            tracing::info!(from, to = self.metadata.schema_version, "store upgraded");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lifecycle

    /// Closes the store, flushing all state and removing the session
    /// undo log.
    pub fn close(mut self) -> StoreResult<()> {
        self.close_inner()
    }

    fn close_inner(&mut self) -> StoreResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if matches!(self.mode, Mode::ReadWrite) {
            self.flush_all()?;
            if let Some(dir) = &self.dir {
                dir.remove_undo_log()?;
            }
        }
        tracing::debug!("store closed");
        Ok(())
    }

    fn flush_all(&mut self) -> StoreResult<()> {
        let sync = self.config.sync_on_commit;
        for table in &mut self.tables {
            table.flush(sync)?;
        }
        for index in &mut self.indexes {
            index.flush(sync)?;
        }
        self.flush_metadata()
    }

    fn flush_metadata(&mut self) -> StoreResult<()> {
        let bytes = self.metadata.encode()?;
        self.metadata_backend.replace(&bytes)?;
        if self.config.sync_on_commit {
            self.metadata_backend.sync()?;
        }
        Ok(())
    }

    fn require_writable(&self, op: &'static str) -> StoreResult<()> {
        if self.is_read_only() {
            return Err(StoreError::read_only(op));
        }
        Ok(())
    }

    fn require_txn(&self, op: &'static str) -> StoreResult<()> {
        self.require_writable(op)?;
        if self.txn.is_none() {
            return Err(StoreError::NoTransaction);
        }
        Ok(())
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(err) = self.close_inner() {
                tracing::error!(error = %err, "error while closing store");
            }
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("mode", &self.mode)
            .field("version", &self.metadata.schema_version)
            .field("in_transaction", &self.txn.is_some())
            .field("undo_depth", &self.undo.len())
            .finish_non_exhaustive()
    }
}
