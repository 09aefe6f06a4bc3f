//! Where a recovery pass gets its oplogs from.

use crate::error::{CoreError, CoreResult};
use crate::oplog::{encode_segment, open_segment, OplogRecord};
use crate::types::OplogId;
use bytes::Bytes;
use oprecover_codec::{VersionTag, VersionedReader};
use oprecover_storage::{ByteSource, SliceSource};
use std::collections::BTreeMap;

/// A set of oplogs belonging to one disk store.
pub trait OplogSource {
    /// Byte source each oplog is read from.
    type Source: ByteSource;

    /// Returns the store name used in error reports.
    fn name(&self) -> &str;

    /// Lists the oplogs in the store, in any order.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing cannot be produced.
    fn oplog_ids(&self) -> CoreResult<Vec<OplogId>>;

    /// Opens an oplog, returning a reader bound to its format version and
    /// positioned at its first record.
    ///
    /// # Errors
    ///
    /// Returns an error if the oplog is missing or its header is invalid.
    fn open_oplog(&self, id: OplogId) -> CoreResult<VersionedReader<Self::Source>>;
}

/// Oplogs held in memory as encoded segments.
#[derive(Debug, Clone, Default)]
pub struct MemoryOplogSource {
    name: String,
    oplogs: BTreeMap<OplogId, Bytes>,
}

impl MemoryOplogSource {
    /// Creates an empty source.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            oplogs: BTreeMap::new(),
        }
    }

    /// Encodes `records` as oplog `id` under `version`.
    ///
    /// # Errors
    ///
    /// Returns an error if a record cannot be encoded under `version`.
    pub fn add_oplog(
        &mut self,
        id: OplogId,
        version: VersionTag,
        records: &[OplogRecord],
    ) -> CoreResult<()> {
        let segment = encode_segment(id, version, records)?;
        self.oplogs.insert(id, Bytes::from(segment));
        Ok(())
    }

    /// Stores raw segment bytes under `id`, header included.
    pub fn add_raw(&mut self, id: OplogId, segment: impl Into<Bytes>) {
        self.oplogs.insert(id, segment.into());
    }

    /// Returns the number of oplogs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.oplogs.len()
    }

    /// Returns true if there are no oplogs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.oplogs.is_empty()
    }
}

impl OplogSource for MemoryOplogSource {
    type Source = SliceSource;

    fn name(&self) -> &str {
        &self.name
    }

    fn oplog_ids(&self) -> CoreResult<Vec<OplogId>> {
        Ok(self.oplogs.keys().copied().collect())
    }

    fn open_oplog(&self, id: OplogId) -> CoreResult<VersionedReader<SliceSource>> {
        let segment = self
            .oplogs
            .get(&id)
            .ok_or_else(|| CoreError::invalid_format(format!("no such oplog: {id}")))?;
        open_segment(SliceSource::new(segment.clone()), Some(id))
    }
}

impl<O: OplogSource + ?Sized> OplogSource for &O {
    type Source = O::Source;

    fn name(&self) -> &str {
        (**self).name()
    }

    fn oplog_ids(&self) -> CoreResult<Vec<OplogId>> {
        (**self).oplog_ids()
    }

    fn open_oplog(&self, id: OplogId) -> CoreResult<VersionedReader<Self::Source>> {
        (**self).open_oplog(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Stamp;

    #[test]
    fn opens_at_segment_version() {
        let mut source = MemoryOplogSource::new("mem");
        source
            .add_oplog(
                OplogId::new(3),
                VersionTag::V1,
                &[OplogRecord::create("k", &b"v"[..], Stamp::UNSTAMPED)],
            )
            .unwrap();

        assert_eq!(source.oplog_ids().unwrap(), vec![OplogId::new(3)]);
        let reader = source.open_oplog(OplogId::new(3)).unwrap();
        assert_eq!(reader.version(), VersionTag::V1);
    }

    #[test]
    fn missing_oplog_fails() {
        let source = MemoryOplogSource::new("mem");
        assert!(source.open_oplog(OplogId::new(1)).is_err());
    }
}
