//! Error types for oprecover core.
//!
//! Every failure during a recovery pass aborts the pass. Whatever the
//! underlying cause, [`Recovery::run`](crate::Recovery::run) hands it to the
//! caller wrapped in [`CoreError::DiskAccess`], which names the store and,
//! where known, the oplog and key involved.

use crate::key::EntryKey;
use crate::types::OplogId;
use oprecover_codec::CodecError;
use oprecover_storage::StorageError;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in oprecover core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend or byte source error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Decoding error with no oplog attached yet.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An oplog could not be decoded.
    #[error("read error in {oplog_id}: {source}")]
    Read {
        /// The oplog being decoded.
        oplog_id: OplogId,
        /// The decode failure.
        #[source]
        source: CodecError,
    },

    /// Persisted data violates an invariant.
    #[error("corruption{}: {message}", context(.oplog_id, .key))]
    Corruption {
        /// The oplog being replayed, if known.
        oplog_id: Option<OplogId>,
        /// The key involved, if known.
        key: Option<EntryKey>,
        /// Description of the corruption.
        message: String,
    },

    /// A record checksum did not match its contents.
    #[error("checksum mismatch in {oplog_id} at offset {offset}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// The oplog containing the record.
        oplog_id: OplogId,
        /// Offset of the record within the segment.
        offset: u64,
        /// Stored checksum.
        expected: u32,
        /// Computed checksum.
        actual: u32,
    },

    /// The export writer failed while flushing a batch.
    #[error("export failed at boundary of {oplog_id}: {source}")]
    ExportSink {
        /// The oplog whose batch was being flushed.
        oplog_id: OplogId,
        /// The writer's failure.
        #[source]
        source: io::Error,
    },

    /// A deferred value could not be faulted in.
    #[error("failed to fault in value at offset {offset} (length {length}): {source}")]
    FaultIn {
        /// Offset of the value in the owning store.
        offset: u64,
        /// Length of the value.
        length: u32,
        /// The store's failure.
        #[source]
        source: StorageError,
    },

    /// An operation was invoked outside its valid recovery state.
    #[error("invalid recovery state: {message}")]
    State {
        /// Description of the violation.
        message: String,
    },

    /// A segment or store directory is not in the expected format.
    #[error("invalid format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Another process holds the store lock.
    #[error("disk store locked: {path}")]
    StoreLocked {
        /// Path of the locked store.
        path: String,
    },

    /// A recovery pass failed; wraps the underlying cause.
    #[error("disk access error in store {store}{}: {source}", context(.oplog_id, .key))]
    DiskAccess {
        /// Name of the disk store.
        store: String,
        /// The oplog being processed when the pass failed.
        oplog_id: Option<OplogId>,
        /// The key involved, if known.
        key: Option<EntryKey>,
        /// The underlying cause.
        #[source]
        source: Box<CoreError>,
    },
}

fn context(oplog_id: &Option<OplogId>, key: &Option<EntryKey>) -> String {
    match (oplog_id, key) {
        (Some(id), Some(key)) => format!(" ({id}, key {key})"),
        (Some(id), None) => format!(" ({id})"),
        (None, Some(key)) => format!(" (key {key})"),
        (None, None) => String::new(),
    }
}

impl CoreError {
    /// Creates a corruption error without oplog or key context.
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption {
            oplog_id: None,
            key: None,
            message: message.into(),
        }
    }

    /// Creates a corruption error for a key in an oplog.
    pub fn corruption_at(oplog_id: OplogId, key: Option<EntryKey>, message: impl Into<String>) -> Self {
        Self::Corruption {
            oplog_id: Some(oplog_id),
            key,
            message: message.into(),
        }
    }

    /// Creates an invalid state error.
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Wraps `cause` as a disk-access failure of `store`.
    ///
    /// The oplog id and key are lifted from the cause. An error that is
    /// already a disk-access error is returned unchanged.
    pub fn disk_access(store: impl Into<String>, cause: CoreError) -> Self {
        if matches!(cause, Self::DiskAccess { .. }) {
            return cause;
        }
        Self::DiskAccess {
            store: store.into(),
            oplog_id: cause.oplog_id(),
            key: cause.key().cloned(),
            source: Box::new(cause),
        }
    }

    /// Attaches an oplog id to errors that do not carry one yet.
    #[must_use]
    pub fn in_oplog(self, id: OplogId) -> Self {
        match self {
            Self::Codec(source) => Self::Read {
                oplog_id: id,
                source,
            },
            Self::Storage(err) => Self::Read {
                oplog_id: id,
                source: err.into(),
            },
            Self::Corruption {
                oplog_id: None,
                key,
                message,
            } => Self::Corruption {
                oplog_id: Some(id),
                key,
                message,
            },
            other => other,
        }
    }

    /// Returns the oplog this error refers to, if any.
    #[must_use]
    pub fn oplog_id(&self) -> Option<OplogId> {
        match self {
            Self::Read { oplog_id, .. }
            | Self::ChecksumMismatch { oplog_id, .. }
            | Self::ExportSink { oplog_id, .. } => Some(*oplog_id),
            Self::Corruption { oplog_id, .. } | Self::DiskAccess { oplog_id, .. } => *oplog_id,
            _ => None,
        }
    }

    /// Returns the key this error refers to, if any.
    #[must_use]
    pub fn key(&self) -> Option<&EntryKey> {
        match self {
            Self::Corruption { key, .. } | Self::DiskAccess { key, .. } => key.as_ref(),
            _ => None,
        }
    }

    /// Returns the innermost cause, looking through [`CoreError::DiskAccess`].
    #[must_use]
    pub fn root_cause(&self) -> &CoreError {
        match self {
            Self::DiskAccess { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Returns true if this is a disk-access failure.
    #[must_use]
    pub fn is_disk_access(&self) -> bool {
        matches!(self, Self::DiskAccess { .. })
    }

    /// Returns true if the root cause is a corruption or checksum error.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::Corruption { .. } | Self::ChecksumMismatch { .. }
        )
    }
}
