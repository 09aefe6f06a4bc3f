//! Streaming oplog record decoder.

use crate::config::RecoveryConfig;
use crate::error::{CoreError, CoreResult};
use crate::oplog::record::{
    read_segment_header, OplogRecord, OplogRecordType, CRC_SIZE, RECORD_HEADER_SIZE,
};
use crate::types::OplogId;
use bytes::Bytes;
use oprecover_codec::{CodecError, VersionedReader};
use oprecover_storage::ByteSource;
use tracing::warn;

/// Reads the segment header from `source` and returns a reader bound to
/// the segment's format version, positioned at the first record.
///
/// # Errors
///
/// Fails if the header is unreadable, or if `expected` is given and the
/// header names a different oplog.
pub fn open_segment<S: ByteSource>(
    mut source: S,
    expected: Option<OplogId>,
) -> CoreResult<VersionedReader<S>> {
    let header = read_segment_header(&mut source)?;
    if let Some(expected) = expected {
        if header.oplog_id != expected {
            return Err(CoreError::invalid_format(format!(
                "segment header names {} but {expected} was requested",
                header.oplog_id
            )));
        }
    }
    Ok(VersionedReader::new(source, header.version))
}

/// Iterator over the records of one oplog, in file order.
///
/// Records are pulled one at a time from the reader, so memory use is
/// bounded by the largest record rather than the segment.
///
/// # Error Handling
///
/// - Source exhausted exactly at a record boundary: iteration ends
/// - Record cut short: read error, or end of iteration when
///   [`RecoveryConfig::tolerate_truncated_tail`] is set
/// - CRC mismatch, unknown record type, oversize payload: error
///
/// After the first error the iterator yields `None`.
pub struct OplogDecoder<S: ByteSource> {
    reader: VersionedReader<S>,
    oplog_id: OplogId,
    config: RecoveryConfig,
    /// Offset of the next record, counted from the first record.
    offset: u64,
    finished: bool,
}

enum Envelope {
    Record { record_type: u8, payload: Bytes },
    End,
}

impl<S: ByteSource> OplogDecoder<S> {
    /// Creates a decoder over `reader`, which must be positioned at a
    /// record boundary.
    pub fn new(reader: VersionedReader<S>, oplog_id: OplogId, config: RecoveryConfig) -> Self {
        Self {
            reader,
            oplog_id,
            config,
            offset: 0,
            finished: false,
        }
    }

    /// Returns the id of the oplog being decoded.
    #[must_use]
    pub fn oplog_id(&self) -> OplogId {
        self.oplog_id
    }

    /// Returns the offset of the next record.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Consumes the decoder, returning the reader.
    pub fn into_reader(self) -> VersionedReader<S> {
        self.reader
    }

    fn read_error(&self, source: CodecError) -> CoreError {
        CoreError::Read {
            oplog_id: self.oplog_id,
            source,
        }
    }

    /// Handles running out of input partway through a record.
    fn truncated(&self, source: CodecError) -> CoreResult<Envelope> {
        if self.config.tolerate_truncated_tail {
            warn!(
                oplog = %self.oplog_id,
                offset = self.offset,
                "truncated record at end of oplog, treating as end of segment"
            );
            Ok(Envelope::End)
        } else {
            Err(self.read_error(source))
        }
    }

    fn read_envelope(&mut self) -> CoreResult<Envelope> {
        let record_type = match self.reader.read_u8() {
            Ok(b) => b,
            Err(e) if e.is_eof() => return Ok(Envelope::End),
            Err(e) => return Err(self.read_error(e)),
        };

        let len = match self.reader.read_u32() {
            Ok(len) => len,
            Err(e) if e.is_eof() => return self.truncated(e),
            Err(e) => return Err(self.read_error(e)),
        };

        if len > self.config.max_record_size {
            return Err(CoreError::corruption_at(
                self.oplog_id,
                None,
                format!(
                    "record at offset {} claims {len} bytes, limit is {}",
                    self.offset, self.config.max_record_size
                ),
            ));
        }

        let payload = match self.reader.read_bytes(u64::from(len)) {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) if e.is_eof() => return self.truncated(e),
            Err(e) => return Err(self.read_error(e)),
        };

        let stored_crc = match self.reader.read_u32() {
            Ok(crc) => crc,
            Err(e) if e.is_eof() => return self.truncated(e),
            Err(e) => return Err(self.read_error(e)),
        };

        if self.config.verify_checksums {
            let mut hasher = crc32fast::Hasher::new();
            hasher.update(&[record_type]);
            hasher.update(&len.to_be_bytes());
            hasher.update(&payload);
            let computed = hasher.finalize();
            if computed != stored_crc {
                return Err(CoreError::ChecksumMismatch {
                    oplog_id: self.oplog_id,
                    offset: self.offset,
                    expected: stored_crc,
                    actual: computed,
                });
            }
        }

        Ok(Envelope::Record {
            record_type,
            payload,
        })
    }

    fn read_next(&mut self) -> CoreResult<Option<OplogRecord>> {
        let (record_type, payload) = match self.read_envelope()? {
            Envelope::Record {
                record_type,
                payload,
            } => (record_type, payload),
            Envelope::End => return Ok(None),
        };

        let record_len = RECORD_HEADER_SIZE + payload.len() + CRC_SIZE;

        let Some(kind) = OplogRecordType::from_byte(record_type) else {
            return Err(CoreError::corruption_at(
                self.oplog_id,
                None,
                format!(
                    "unknown record type {record_type:#04x} at offset {}",
                    self.offset
                ),
            ));
        };

        let record =
            OplogRecord::decode_payload(kind, payload, self.reader.version(), self.oplog_id)?;
        self.offset += record_len as u64;
        Ok(Some(record))
    }
}

impl<S: ByteSource> Iterator for OplogDecoder<S> {
    type Item = CoreResult<OplogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.read_next() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
