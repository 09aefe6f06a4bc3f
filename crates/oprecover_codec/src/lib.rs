//! # oprecover codec
//!
//! Version-tagged binary decoding.
//!
//! Every stream the recovery engine reads was produced by *some* release.
//! A [`VersionedReader`] wraps a byte source together with the
//! [`VersionTag`] of the release that wrote it, and that tag is handed
//! explicitly to every codec reached through the reader. A single build can
//! therefore decode archives from older releases without keeping parallel
//! decode paths anywhere else.
//!
//! ## Layout
//!
//! - [`VersionTag`] - ordered format version identifier
//! - [`VersionedReader`] / [`VersionedWriter`] - big-endian primitives,
//!   length-prefixed text and byte arrays, object delegation
//! - [`ObjectCodec`] - pluggable object-level codec
//! - [`Value`] / [`ValueCodec`] - the stock dynamic value and its codec
//!
//! ## Usage
//!
//! ```
//! use oprecover_codec::{Value, ValueCodec, VersionTag, VersionedReader, VersionedWriter};
//! use oprecover_storage::SliceSource;
//!
//! let mut writer = VersionedWriter::new(VersionTag::CURRENT);
//! writer.write_object(&ValueCodec, &Value::Text("k1".into())).unwrap();
//!
//! let source = SliceSource::new(writer.into_bytes());
//! let mut reader = VersionedReader::new(source, VersionTag::CURRENT);
//! let value = reader.read_object(&ValueCodec).unwrap();
//! assert_eq!(value, Value::Text("k1".into()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod object;
mod reader;
mod value;
mod version;
mod writer;

pub use error::{CodecError, CodecResult};
pub use object::ObjectCodec;
pub use reader::{VersionedReader, MAX_BYTES_LENGTH};
pub use value::{Value, ValueCodec, ValueTag};
pub use version::VersionTag;
pub use writer::VersionedWriter;
