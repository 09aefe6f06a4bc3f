//! Oplog segment writer.

use crate::error::CoreResult;
use crate::oplog::record::{frame_record, OplogRecord, SegmentHeader};
use crate::types::OplogId;
use oprecover_codec::VersionTag;
use oprecover_storage::{InMemoryBackend, StorageBackend};

/// Appends framed records to one oplog segment.
///
/// The writer only encodes; when segments are rolled or compacted is the
/// caller's business.
pub struct OplogWriter<B: StorageBackend> {
    backend: B,
    oplog_id: OplogId,
    version: VersionTag,
    records: u64,
}

impl<B: StorageBackend> OplogWriter<B> {
    /// Starts a segment in `backend` by writing its header.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be written.
    pub fn create(mut backend: B, oplog_id: OplogId, version: VersionTag) -> CoreResult<Self> {
        backend.append(&SegmentHeader::new(oplog_id, version).encode())?;
        Ok(Self {
            backend,
            oplog_id,
            version,
            records: 0,
        })
    }

    /// Returns the segment's oplog id.
    #[must_use]
    pub fn oplog_id(&self) -> OplogId {
        self.oplog_id
    }

    /// Returns the format version records are written with.
    #[must_use]
    pub fn version(&self) -> VersionTag {
        self.version
    }

    /// Returns the number of records appended so far.
    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.records
    }

    /// Appends a record.
    ///
    /// Returns the offset where the record was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded under this
    /// segment's version or the write fails.
    pub fn append(&mut self, record: &OplogRecord) -> CoreResult<u64> {
        let payload = record.encode_payload(self.version)?;
        self.append_raw(record.record_type().as_byte(), &payload)
    }

    /// Frames and appends an already encoded payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is too large or the write fails.
    pub fn append_raw(&mut self, record_type: u8, payload: &[u8]) -> CoreResult<u64> {
        let data = frame_record(record_type, payload)?;
        let offset = self.backend.append(&data)?;
        self.records += 1;
        Ok(offset)
    }

    /// Flushes buffered writes.
    pub fn flush(&mut self) -> CoreResult<()> {
        self.backend.flush()?;
        Ok(())
    }

    /// Syncs the segment to durable storage.
    pub fn sync(&mut self) -> CoreResult<()> {
        self.backend.sync()?;
        Ok(())
    }

    /// Consumes the writer, returning the backend.
    pub fn into_inner(self) -> B {
        self.backend
    }
}

/// Encodes a complete segment in memory.
///
/// # Errors
///
/// Returns an error if any record cannot be encoded under `version`.
pub fn encode_segment(
    oplog_id: OplogId,
    version: VersionTag,
    records: &[OplogRecord],
) -> CoreResult<Vec<u8>> {
    let mut writer = OplogWriter::create(InMemoryBackend::new(), oplog_id, version)?;
    for record in records {
        writer.append(record)?;
    }
    Ok(writer.into_inner().data())
}
