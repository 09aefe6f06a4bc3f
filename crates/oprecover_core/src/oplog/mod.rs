//! Oplog segments: on-disk format, streaming decoder and writer.
//!
//! ## Segment Format
//!
//! ```text
//! | magic "OPLG" (4) | version (2) | oplog id (8) |     header
//! | type (1) | length (4) | payload (N) | crc32 (4) |  record, repeated
//! ```
//!
//! All integers are big-endian. The CRC covers type, length and payload.
//! The header's version selects how every payload in the segment is decoded.
//!
//! ## Record Payloads
//!
//! - key, encoded with [`oprecover_codec::ValueCodec`]
//! - create/update only: value tag (`0` null, `1` inline byte array,
//!   `2` on-disk offset u64 + length u32)
//! - create/update only, V2 onwards: entry version u32, region version u64
//!
//! A null value is never valid and is reported as corruption.

mod decoder;
mod record;
mod writer;

pub use decoder::{open_segment, OplogDecoder};
pub use record::{
    compute_crc32, frame_record, read_segment_header, OplogRecord, OplogRecordType, SegmentHeader,
    CRC_SIZE, OPLOG_MAGIC, RECORD_HEADER_SIZE, SEGMENT_HEADER_SIZE,
};
pub use writer::{encode_segment, OplogWriter};
