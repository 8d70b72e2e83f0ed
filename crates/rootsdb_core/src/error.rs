//! Error types for the object store.

use crate::types::{GrampsId, Handle, ObjectKind};
use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
///
/// The first two variants are the ones a UI layer is expected to
/// distinguish: an unusable substrate versus a store written by a newer
/// engine (which can be messaged as "cannot open" versus "upgrade
/// required elsewhere").
#[derive(Debug, Error)]
pub enum StoreError {
    /// The substrate cannot be opened or created. Fatal.
    #[error("environment error: {0}")]
    Environment(#[from] rootsdb_storage::StorageError),

    /// Another process holds the store lock.
    #[error("store locked: another process has exclusive access")]
    Locked,

    /// The stored schema version is newer than this engine understands.
    /// Fatal, no automatic recovery.
    #[error("unsupported schema version {stored} (latest supported: {latest})")]
    UnsupportedVersion {
        /// Version found in the metadata record.
        stored: u32,
        /// Newest version this engine understands.
        latest: u32,
    },

    /// No record with this handle. Recoverable.
    #[error("{kind} record not found: {handle}")]
    NotFound {
        /// Kind searched.
        kind: ObjectKind,
        /// Handle that was not found.
        handle: Handle,
    },

    /// No record with this Gramps-ID. Recoverable.
    #[error("{kind} record not found for ID {id}")]
    IdNotFound {
        /// Kind searched.
        kind: ObjectKind,
        /// ID that was not found.
        id: GrampsId,
    },

    /// A mutating call was made on a read-only store.
    #[error("read-only violation: {op} requires a writable store")]
    ReadOnly {
        /// The rejected operation.
        op: &'static str,
    },

    /// A table or index snapshot could not be decoded.
    #[error("corrupt store data: {message}")]
    Corrupt {
        /// Description of the corruption.
        message: String,
    },

    /// CBOR encode/decode failure.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// An add used a handle that already names a record.
    #[error("handle already in use in {kind} table: {handle}")]
    HandleInUse {
        /// Kind of the colliding table.
        kind: ObjectKind,
        /// The colliding handle.
        handle: Handle,
    },

    /// A unique index rejected a duplicate key.
    #[error("unique index {index} already maps key {key:?}")]
    IndexConflict {
        /// Name of the index.
        index: String,
        /// The duplicated key, lossily rendered.
        key: String,
    },

    /// No index registered under this name.
    #[error("unknown index: {name}")]
    UnknownIndex {
        /// The requested name.
        name: String,
    },

    /// A second transaction was begun while one is active.
    #[error("a transaction is already active")]
    TransactionActive,

    /// A mutation was attempted outside any transaction.
    #[error("no active transaction")]
    NoTransaction,
}

impl StoreError {
    /// Creates a corrupt-data error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates a read-only violation.
    #[must_use]
    pub const fn read_only(op: &'static str) -> Self {
        Self::ReadOnly { op }
    }
}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        Self::Environment(rootsdb_storage::StorageError::Io(e))
    }
}
