//! Recovered entries and their values.

use crate::error::{CoreError, CoreResult};
use crate::types::Stamp;
use bytes::Bytes;
use oprecover_storage::StorageBackend;

/// The value half of a recovered entry.
///
/// Large values are not pulled into memory during replay. The oplog records
/// where they live in the owning store's value file, and the reference is
/// resolved only when [`RecoveredEntry::materialize`] is called.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryValue {
    /// Value bytes carried in the oplog record.
    Inline(Bytes),
    /// Value stored elsewhere in the owning store.
    OnDisk {
        /// Byte offset within the value store.
        offset: u64,
        /// Length in bytes.
        length: u32,
    },
}

impl EntryValue {
    /// Returns true if the value has not been faulted in.
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::OnDisk { .. })
    }

    /// Returns the inline bytes, if the value is inline.
    #[must_use]
    pub fn as_inline(&self) -> Option<&Bytes> {
        match self {
            Self::Inline(bytes) => Some(bytes),
            Self::OnDisk { .. } => None,
        }
    }

    /// Returns the value length in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        match self {
            Self::Inline(bytes) => bytes.len() as u64,
            Self::OnDisk { length, .. } => u64::from(*length),
        }
    }

    /// Returns true if the value is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The latest known state of one key during a replay pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecoveredEntry {
    /// The value, inline or deferred.
    pub value: EntryValue,
    /// The stamp of the mutation that produced this state.
    pub stamp: Stamp,
}

impl RecoveredEntry {
    /// Creates a new entry.
    #[must_use]
    pub fn new(value: EntryValue, stamp: Stamp) -> Self {
        Self { value, stamp }
    }

    /// Creates an entry with an inline value.
    #[must_use]
    pub fn inline(bytes: impl Into<Bytes>, stamp: Stamp) -> Self {
        Self::new(EntryValue::Inline(bytes.into()), stamp)
    }

    /// Creates an entry whose value lives in the value store.
    #[must_use]
    pub fn on_disk(offset: u64, length: u32, stamp: Stamp) -> Self {
        Self::new(EntryValue::OnDisk { offset, length }, stamp)
    }

    /// Returns the value bytes, reading deferred values from `store`.
    ///
    /// Inline values are returned without touching the store.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::FaultIn`] if the store cannot supply the bytes.
    pub fn materialize(&self, store: &dyn StorageBackend) -> CoreResult<Bytes> {
        match &self.value {
            EntryValue::Inline(bytes) => Ok(bytes.clone()),
            EntryValue::OnDisk { offset, length } => store
                .read_at(*offset, *length as usize)
                .map(Bytes::from)
                .map_err(|source| CoreError::FaultIn {
                    offset: *offset,
                    length: *length,
                    source,
                }),
        }
    }
}
