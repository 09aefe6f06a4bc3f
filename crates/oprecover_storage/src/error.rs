//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of storage.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current storage size.
        size: u64,
    },

    /// The source or backend has been closed.
    #[error("storage is closed")]
    Closed,
}

impl StorageError {
    /// Returns true if this error means the data simply ran out.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        match self {
            Self::ReadPastEnd { .. } => true,
            Self::Io(e) => e.kind() == io::ErrorKind::UnexpectedEof,
            Self::Closed => false,
        }
    }
}
