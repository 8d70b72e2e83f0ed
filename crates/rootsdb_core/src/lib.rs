//! # rootsdb
//!
//! An embedded, persistent object store for genealogical records.
//!
//! A store holds one primary table per object kind (person, family,
//! event, place, source, media, note), keyed by engine-assigned
//! [`Handle`]s, with secondary indexes derived through typed key
//! extraction. Record payloads are opaque bytes; the engine only looks
//! inside them through registered CBOR field paths.
//!
//! Mutations run inside labeled transactions and are undoable for the
//! life of the session, across commit boundaries. Stores written by
//! older engine versions are upgraded in place through a sequential
//! migration chain.
//!
//! ```no_run
//! use rootsdb_core::{NewObject, Store};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), rootsdb_core::StoreError> {
//! let payload: Vec<u8> = serialized_person();
//! let mut store = Store::open(Path::new("/tmp/tree"))?;
//! store.begin_transaction("add person")?;
//! let handle = store.add_person(NewObject::from_payload(payload))?;
//! store.commit()?;
//! # Ok(())
//! # }
//! # fn serialized_person() -> Vec<u8> { Vec::new() }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregates;
pub mod codec;
pub mod config;
pub mod cursor;
pub mod dir;
pub mod error;
pub mod index;
pub mod metadata;
pub mod migration;
pub mod object;
pub mod store;
pub mod table;
pub mod types;
pub mod undo;

pub use aggregates::{Gender, GenderStats};
pub use config::Config;
pub use cursor::{IndexCursor, TableCursor};
pub use error::{StoreError, StoreResult};
pub use index::{FieldPathExtractor, GrampsIdExtractor, IndexKey, KeyExtractor};
pub use migration::LATEST_VERSION;
pub use object::{NewObject, StoredObject};
pub use store::{Mode, Store};
pub use types::{GrampsId, Handle, ObjectKind};
