//! Versioned binary reader.

use crate::error::{CodecError, CodecResult};
use crate::object::ObjectCodec;
use crate::version::VersionTag;
use oprecover_storage::ByteSource;
use std::fmt;

/// Maximum accepted length for a single text or byte array.
///
/// Guards against allocation blow-ups from corrupt length prefixes.
pub const MAX_BYTES_LENGTH: u64 = 256 * 1024 * 1024;

/// A reader over a byte source produced by a known format version.
///
/// All multi-byte primitives are big-endian. The reader adds no buffering
/// and no retries; every call consumes bytes straight from the source.
///
/// # Example
///
/// ```
/// use oprecover_codec::{VersionTag, VersionedReader};
/// use oprecover_storage::SliceSource;
///
/// let source = SliceSource::new(vec![0x00, 0x2a, 0x01]);
/// let mut reader = VersionedReader::new(source, VersionTag::V1);
/// assert_eq!(reader.read_u16().unwrap(), 42);
/// assert!(reader.read_bool().unwrap());
/// ```
pub struct VersionedReader<S: ByteSource> {
    source: S,
    version: VersionTag,
}

impl<S: ByteSource> VersionedReader<S> {
    /// Wraps `source`, recording the version that produced it.
    pub fn new(source: S, version: VersionTag) -> Self {
        Self { source, version }
    }

    /// Returns the format version of the underlying stream.
    #[must_use]
    pub fn version(&self) -> VersionTag {
        self.version
    }

    /// Fills `buf` completely.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnexpectedEof`] if the source runs out.
    pub fn read_fully(&mut self, buf: &mut [u8]) -> CodecResult<()> {
        self.source.read_exact(buf)?;
        Ok(())
    }

    #[inline]
    fn read_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let mut buf = [0u8; N];
        self.source.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Reads a boolean; any non-zero byte is `true`.
    pub fn read_bool(&mut self) -> CodecResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Reads an unsigned byte.
    pub fn read_u8(&mut self) -> CodecResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Reads a signed byte.
    pub fn read_i8(&mut self) -> CodecResult<i8> {
        Ok(i8::from_be_bytes(self.read_array()?))
    }

    /// Reads an unsigned 16-bit integer.
    pub fn read_u16(&mut self) -> CodecResult<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    /// Reads a signed 16-bit integer.
    pub fn read_i16(&mut self) -> CodecResult<i16> {
        Ok(i16::from_be_bytes(self.read_array()?))
    }

    /// Reads a single UTF-16 code unit as a `char`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidChar`] for lone surrogates.
    pub fn read_char(&mut self) -> CodecResult<char> {
        let code = self.read_u16()?;
        char::from_u32(u32::from(code)).ok_or(CodecError::InvalidChar { code })
    }

    /// Reads an unsigned 32-bit integer.
    pub fn read_u32(&mut self) -> CodecResult<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    /// Reads a signed 32-bit integer.
    pub fn read_i32(&mut self) -> CodecResult<i32> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    /// Reads an unsigned 64-bit integer.
    pub fn read_u64(&mut self) -> CodecResult<u64> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    /// Reads a signed 64-bit integer.
    pub fn read_i64(&mut self) -> CodecResult<i64> {
        Ok(i64::from_be_bytes(self.read_array()?))
    }

    /// Reads an IEEE-754 single.
    pub fn read_f32(&mut self) -> CodecResult<f32> {
        Ok(f32::from_be_bytes(self.read_array()?))
    }

    /// Reads an IEEE-754 double.
    pub fn read_f64(&mut self) -> CodecResult<f64> {
        Ok(f64::from_be_bytes(self.read_array()?))
    }

    /// Reads exactly `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::SizeLimitExceeded`] if `len` is above
    /// [`MAX_BYTES_LENGTH`], or [`CodecError::UnexpectedEof`] without
    /// allocating if the source holds fewer than `len` bytes.
    pub fn read_bytes(&mut self, len: u64) -> CodecResult<Vec<u8>> {
        if len > MAX_BYTES_LENGTH {
            return Err(CodecError::SizeLimitExceeded {
                claimed: len,
                max_allowed: MAX_BYTES_LENGTH,
            });
        }
        let available = self.source.available()?;
        if len > available {
            return Err(CodecError::UnexpectedEof {
                needed: len as usize,
                available,
            });
        }
        let mut buf = vec![0u8; len as usize];
        self.source.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Reads a byte array with a u32 length prefix.
    pub fn read_byte_array(&mut self) -> CodecResult<Vec<u8>> {
        let len = self.read_u32()?;
        self.read_bytes(u64::from(len))
    }

    /// Reads length-prefixed UTF-8 text.
    ///
    /// The prefix is a u16 under [`VersionTag::V1`] and a u32 from
    /// [`VersionTag::V2`] on.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidUtf8`] if the bytes are not UTF-8.
    pub fn read_text(&mut self) -> CodecResult<String> {
        let len = if self.version.has_wide_text() {
            u64::from(self.read_u32()?)
        } else {
            u64::from(self.read_u16()?)
        };
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)
    }

    /// Decodes one object through `codec`, handing it this reader's version.
    ///
    /// # Errors
    ///
    /// Propagates the codec's error, including
    /// [`CodecError::UnrecognizedSchema`].
    pub fn read_object<C: ObjectCodec>(&mut self, codec: &C) -> CodecResult<C::Object> {
        let version = self.version;
        codec.decode(self, version)
    }

    /// Skips up to `n` bytes, returning how many were skipped.
    pub fn skip(&mut self, n: u64) -> CodecResult<u64> {
        Ok(self.source.skip(n)?)
    }

    /// Returns the number of bytes still available from the source.
    pub fn available(&self) -> CodecResult<u64> {
        Ok(self.source.available()?)
    }

    /// Closes the underlying source.
    pub fn close(&mut self) -> CodecResult<()> {
        self.source.close()?;
        Ok(())
    }

    /// Returns a mutable reference to the underlying source.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Consumes the reader, returning the source.
    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S: ByteSource> fmt::Display for VersionedReader<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionedReader ({})", self.version)
    }
}

impl<S: ByteSource> fmt::Debug for VersionedReader<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionedReader")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}
