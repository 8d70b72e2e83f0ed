//! Error types for storage backends.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The substrate path cannot be used (missing, not a file, bad permissions).
    #[error("substrate unavailable: {message}")]
    Unavailable {
        /// Description of why the substrate cannot be opened.
        message: String,
    },
}

impl StorageError {
    /// Creates an unavailable-substrate error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}
