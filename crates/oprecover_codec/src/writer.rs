//! Versioned binary writer.

use crate::error::{CodecError, CodecResult};
use crate::object::ObjectCodec;
use crate::reader::MAX_BYTES_LENGTH;
use crate::version::VersionTag;
use bytes::{BufMut, Bytes, BytesMut};

/// The encoding side of [`VersionedReader`](crate::VersionedReader).
///
/// Writes big-endian primitives into an in-memory buffer using the layout
/// of a fixed format version.
#[derive(Debug, Clone)]
pub struct VersionedWriter {
    buf: BytesMut,
    version: VersionTag,
}

impl VersionedWriter {
    /// Creates an empty writer for `version`.
    #[must_use]
    pub fn new(version: VersionTag) -> Self {
        Self::with_capacity(version, 64)
    }

    /// Creates an empty writer with the given buffer capacity.
    #[must_use]
    pub fn with_capacity(version: VersionTag, capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            version,
        }
    }

    /// Returns the format version being written.
    #[must_use]
    pub fn version(&self) -> VersionTag {
        self.version
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Returns the bytes written so far.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the writer, returning the encoded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }

    /// Writes a boolean as one byte.
    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(u8::from(value));
    }

    /// Writes an unsigned byte.
    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    /// Writes a signed byte.
    pub fn write_i8(&mut self, value: i8) {
        self.buf.put_i8(value);
    }

    /// Writes an unsigned 16-bit integer.
    pub fn write_u16(&mut self, value: u16) {
        self.buf.put_u16(value);
    }

    /// Writes a signed 16-bit integer.
    pub fn write_i16(&mut self, value: i16) {
        self.buf.put_i16(value);
    }

    /// Writes a `char` as a single UTF-16 code unit.
    ///
    /// # Errors
    ///
    /// Returns an error for characters outside the Basic Multilingual Plane.
    pub fn write_char(&mut self, value: char) -> CodecResult<()> {
        let code = u16::try_from(u32::from(value)).map_err(|_| {
            CodecError::encoding_failed(format!("char {value:?} needs more than one code unit"))
        })?;
        self.buf.put_u16(code);
        Ok(())
    }

    /// Writes an unsigned 32-bit integer.
    pub fn write_u32(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    /// Writes a signed 32-bit integer.
    pub fn write_i32(&mut self, value: i32) {
        self.buf.put_i32(value);
    }

    /// Writes an unsigned 64-bit integer.
    pub fn write_u64(&mut self, value: u64) {
        self.buf.put_u64(value);
    }

    /// Writes a signed 64-bit integer.
    pub fn write_i64(&mut self, value: i64) {
        self.buf.put_i64(value);
    }

    /// Writes an IEEE-754 single.
    pub fn write_f32(&mut self, value: f32) {
        self.buf.put_f32(value);
    }

    /// Writes an IEEE-754 double.
    pub fn write_f64(&mut self, value: f64) {
        self.buf.put_f64(value);
    }

    /// Writes raw bytes with no prefix.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Writes a byte array with a u32 length prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the array is longer than [`MAX_BYTES_LENGTH`].
    pub fn write_byte_array(&mut self, bytes: &[u8]) -> CodecResult<()> {
        let len = checked_len(bytes.len())?;
        self.buf.put_u32(len);
        self.buf.put_slice(bytes);
        Ok(())
    }

    /// Writes length-prefixed UTF-8 text using this writer's version layout.
    ///
    /// # Errors
    ///
    /// Returns an error if the text does not fit the version's prefix width.
    pub fn write_text(&mut self, text: &str) -> CodecResult<()> {
        let bytes = text.as_bytes();
        if self.version.has_wide_text() {
            let len = checked_len(bytes.len())?;
            self.buf.put_u32(len);
        } else {
            let len = u16::try_from(bytes.len()).map_err(|_| {
                CodecError::encoding_failed(format!(
                    "text of {} bytes does not fit a {} length prefix",
                    bytes.len(),
                    self.version
                ))
            })?;
            self.buf.put_u16(len);
        }
        self.buf.put_slice(bytes);
        Ok(())
    }

    /// Encodes one object through `codec` under this writer's version.
    ///
    /// # Errors
    ///
    /// Propagates the codec's error.
    pub fn write_object<C: ObjectCodec>(&mut self, codec: &C, object: &C::Object) -> CodecResult<()> {
        let version = self.version;
        codec.encode(self, version, object)
    }
}

fn checked_len(len: usize) -> CodecResult<u32> {
    if len as u64 > MAX_BYTES_LENGTH {
        return Err(CodecError::SizeLimitExceeded {
            claimed: len as u64,
            max_allowed: MAX_BYTES_LENGTH,
        });
    }
    u32::try_from(len).map_err(|_| CodecError::encoding_failed("length does not fit u32"))
}
