//! Oplog segment header and record types.

use crate::entry::{EntryValue, RecoveredEntry};
use crate::error::{CoreError, CoreResult};
use crate::key::EntryKey;
use crate::types::{OplogId, Stamp};
use bytes::Bytes;
use oprecover_codec::{ValueCodec, VersionTag, VersionedReader, VersionedWriter};
use oprecover_storage::{ByteSource, SliceSource};

/// Magic bytes opening every oplog segment.
pub const OPLOG_MAGIC: [u8; 4] = *b"OPLG";

/// Segment header size: magic (4) + version (2) + oplog id (8).
pub const SEGMENT_HEADER_SIZE: usize = 14;

/// Record envelope size before the payload: type (1) + length (4).
pub const RECORD_HEADER_SIZE: usize = 5;

/// CRC size.
pub const CRC_SIZE: usize = 4;

const VALUE_NULL: u8 = 0;
const VALUE_INLINE: u8 = 1;
const VALUE_ON_DISK: u8 = 2;

/// The header written at the start of every oplog segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Id of the oplog this segment holds.
    pub oplog_id: OplogId,
    /// Format version the records were written with.
    pub version: VersionTag,
}

impl SegmentHeader {
    /// Creates a new header.
    #[must_use]
    pub const fn new(oplog_id: OplogId, version: VersionTag) -> Self {
        Self { oplog_id, version }
    }

    /// Encodes the header.
    #[must_use]
    pub fn encode(&self) -> [u8; SEGMENT_HEADER_SIZE] {
        let mut buf = [0u8; SEGMENT_HEADER_SIZE];
        buf[0..4].copy_from_slice(&OPLOG_MAGIC);
        buf[4..6].copy_from_slice(&self.version.ordinal().to_be_bytes());
        buf[6..14].copy_from_slice(&self.oplog_id.as_u64().to_be_bytes());
        buf
    }

    /// Decodes a header.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFormat`] on bad magic, or a codec error
    /// if the version is newer than this build understands.
    pub fn decode(buf: &[u8; SEGMENT_HEADER_SIZE]) -> CoreResult<Self> {
        if buf[0..4] != OPLOG_MAGIC {
            return Err(CoreError::invalid_format(format!(
                "bad oplog magic {:02x?}",
                &buf[0..4]
            )));
        }
        let ordinal = u16::from_be_bytes([buf[4], buf[5]]);
        let version = VersionTag::from_ordinal(ordinal)?;
        let mut id = [0u8; 8];
        id.copy_from_slice(&buf[6..14]);
        Ok(Self::new(OplogId::new(u64::from_be_bytes(id)), version))
    }
}

/// Reads the segment header from the front of `source`.
///
/// The header supplies the version a reader over the rest of the segment
/// must be bound to.
///
/// # Errors
///
/// Fails if the source is too short, the magic is wrong, or the version is
/// unsupported.
pub fn read_segment_header<S: ByteSource>(source: &mut S) -> CoreResult<SegmentHeader> {
    let mut buf = [0u8; SEGMENT_HEADER_SIZE];
    source.read_exact(&mut buf)?;
    SegmentHeader::decode(&buf)
}

/// Type of an oplog record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OplogRecordType {
    /// First write of a key.
    Create = 1,
    /// Overwrite of an existing key.
    Update = 2,
    /// Removal of a key.
    Destroy = 3,
}

impl OplogRecordType {
    /// Converts a byte to a record type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Create),
            2 => Some(Self::Update),
            3 => Some(Self::Destroy),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Returns a lowercase name for display.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Destroy => "destroy",
        }
    }
}

/// One mutation decoded from an oplog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OplogRecord {
    /// First write of a key.
    Create {
        /// The key written.
        key: EntryKey,
        /// The value, inline or deferred.
        value: EntryValue,
        /// Version stamp; unstamped for V1 segments.
        stamp: Stamp,
    },

    /// Overwrite of an existing key.
    Update {
        /// The key written.
        key: EntryKey,
        /// The value, inline or deferred.
        value: EntryValue,
        /// Version stamp; unstamped for V1 segments.
        stamp: Stamp,
    },

    /// Removal of a key.
    Destroy {
        /// The key removed.
        key: EntryKey,
    },
}

impl OplogRecord {
    /// Shorthand for a create with an inline value.
    pub fn create(key: impl Into<EntryKey>, value: impl Into<Bytes>, stamp: Stamp) -> Self {
        Self::Create {
            key: key.into(),
            value: EntryValue::Inline(value.into()),
            stamp,
        }
    }

    /// Shorthand for an update with an inline value.
    pub fn update(key: impl Into<EntryKey>, value: impl Into<Bytes>, stamp: Stamp) -> Self {
        Self::Update {
            key: key.into(),
            value: EntryValue::Inline(value.into()),
            stamp,
        }
    }

    /// Shorthand for a destroy.
    pub fn destroy(key: impl Into<EntryKey>) -> Self {
        Self::Destroy { key: key.into() }
    }

    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> OplogRecordType {
        match self {
            Self::Create { .. } => OplogRecordType::Create,
            Self::Update { .. } => OplogRecordType::Update,
            Self::Destroy { .. } => OplogRecordType::Destroy,
        }
    }

    /// Returns the key this record mutates.
    #[must_use]
    pub fn key(&self) -> &EntryKey {
        match self {
            Self::Create { key, .. } | Self::Update { key, .. } | Self::Destroy { key } => key,
        }
    }

    /// Returns the entry a create or update installs.
    #[must_use]
    pub fn entry(&self) -> Option<RecoveredEntry> {
        match self {
            Self::Create { value, stamp, .. } | Self::Update { value, stamp, .. } => {
                Some(RecoveredEntry::new(value.clone(), *stamp))
            }
            Self::Destroy { .. } => None,
        }
    }

    /// Serializes the record payload (without envelope) under `version`.
    ///
    /// Stamps are dropped for versions that do not carry them.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be represented under `version`.
    pub fn encode_payload(&self, version: VersionTag) -> CoreResult<Bytes> {
        let mut writer = VersionedWriter::new(version);
        writer.write_object(&ValueCodec, self.key().as_value())?;

        match self {
            Self::Create { value, stamp, .. } | Self::Update { value, stamp, .. } => {
                match value {
                    EntryValue::Inline(bytes) => {
                        writer.write_u8(VALUE_INLINE);
                        writer.write_byte_array(bytes)?;
                    }
                    EntryValue::OnDisk { offset, length } => {
                        writer.write_u8(VALUE_ON_DISK);
                        writer.write_u64(*offset);
                        writer.write_u32(*length);
                    }
                }
                if version.has_stamps() {
                    writer.write_u32(stamp.entry_version);
                    writer.write_u64(stamp.region_version);
                }
            }
            Self::Destroy { .. } => {}
        }

        Ok(writer.into_bytes())
    }

    /// Deserializes a record payload written under `version`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Read`] if the payload is malformed, and
    /// [`CoreError::Corruption`] if a create or update carries a null value,
    /// the key is null, or bytes remain after the record.
    pub fn decode_payload(
        record_type: OplogRecordType,
        payload: Bytes,
        version: VersionTag,
        oplog_id: OplogId,
    ) -> CoreResult<Self> {
        let mut reader = VersionedReader::new(SliceSource::new(payload), version);
        let record = Self::decode_from(record_type, &mut reader, oplog_id)
            .map_err(|e| e.in_oplog(oplog_id))?;

        let trailing = reader.available().map_err(|e| CoreError::from(e).in_oplog(oplog_id))?;
        if trailing != 0 {
            return Err(CoreError::corruption_at(
                oplog_id,
                Some(record.key().clone()),
                format!("{trailing} trailing bytes after {} record", record_type.name()),
            ));
        }
        Ok(record)
    }

    fn decode_from(
        record_type: OplogRecordType,
        reader: &mut VersionedReader<SliceSource>,
        oplog_id: OplogId,
    ) -> CoreResult<Self> {
        let key = EntryKey::try_from(reader.read_object(&ValueCodec)?)?;

        if record_type == OplogRecordType::Destroy {
            return Ok(Self::Destroy { key });
        }

        let value = match reader.read_u8()? {
            VALUE_INLINE => EntryValue::Inline(Bytes::from(reader.read_byte_array()?)),
            VALUE_ON_DISK => {
                let offset = reader.read_u64()?;
                let length = reader.read_u32()?;
                EntryValue::OnDisk { offset, length }
            }
            VALUE_NULL => {
                return Err(CoreError::corruption_at(
                    oplog_id,
                    Some(key),
                    format!("{} record with null value", record_type.name()),
                ));
            }
            other => {
                return Err(CoreError::corruption_at(
                    oplog_id,
                    Some(key),
                    format!("unknown value tag {other:#04x}"),
                ));
            }
        };

        let stamp = if reader.version().has_stamps() {
            let entry_version = reader.read_u32()?;
            let region_version = reader.read_u64()?;
            Stamp::new(entry_version, region_version)
        } else {
            Stamp::UNSTAMPED
        };

        Ok(match record_type {
            OplogRecordType::Create => Self::Create { key, value, stamp },
            _ => Self::Update { key, value, stamp },
        })
    }
}

/// Computes the CRC32 checksum of data.
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Wraps a payload in a record envelope.
///
/// The type byte is taken as-is, so callers can frame payloads that a
/// decoder must reject.
///
/// # Errors
///
/// Returns an error if the payload is longer than `u32::MAX`.
pub fn frame_record(record_type: u8, payload: &[u8]) -> CoreResult<Vec<u8>> {
    let len = u32::try_from(payload.len())
        .map_err(|_| CoreError::invalid_format("oplog record payload too large"))?;

    let mut data = Vec::with_capacity(RECORD_HEADER_SIZE + payload.len() + CRC_SIZE);
    data.push(record_type);
    data.extend_from_slice(&len.to_be_bytes());
    data.extend_from_slice(payload);

    let crc = compute_crc32(&data);
    data.extend_from_slice(&crc.to_be_bytes());
    Ok(data)
}
