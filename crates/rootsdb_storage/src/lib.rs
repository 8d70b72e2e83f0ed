//! # rootsdb storage
//!
//! Substrate abstraction for the rootsdb engine.
//!
//! A [`StorageBackend`] is an opaque byte store with two access shapes:
//! whole-snapshot replacement (used by the primary and index tables)
//! and append-only growth (used by the session undo log). The engine
//! owns all format interpretation; backends never understand tables,
//! indexes, or undo entries.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
