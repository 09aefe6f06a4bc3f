//! Dynamic value type and its stock codec.

use crate::error::{CodecError, CodecResult};
use crate::object::ObjectCodec;
use crate::reader::VersionedReader;
use crate::version::VersionTag;
use crate::writer::VersionedWriter;
use oprecover_storage::ByteSource;
use std::fmt;

/// Maximum number of elements accepted in one array.
const MAX_ARRAY_ELEMENTS: u32 = 16 * 1024 * 1024;

/// Maximum nesting depth of arrays.
const MAX_DEPTH: usize = 64;

/// A dynamic value.
///
/// Equality, ordering and hashing are structural, which makes `Value`
/// usable as a map key. Floats are intentionally not representable so that
/// equality stays reflexive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer (full i64 range).
    Integer(i64),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Text string (UTF-8).
    Text(String),
    /// Array of values.
    Array(Vec<Value>),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as text, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as bytes, if it is a byte string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get this value as an array, if it is one.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Bytes(bytes) => {
                f.write_str("0x")?;
                for b in bytes {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

/// Type tags written ahead of every encoded [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ValueTag {
    /// Null.
    Null = 0,
    /// One-byte boolean.
    Bool = 1,
    /// Eight-byte integer.
    Integer = 2,
    /// u32-prefixed byte string.
    Bytes = 3,
    /// Version-prefixed text.
    Text = 4,
    /// u32 count followed by elements.
    Array = 5,
    /// Four-byte integer, introduced in [`VersionTag::V2`].
    SmallInt = 6,
}

impl ValueTag {
    /// Resolves a tag byte under `version`.
    ///
    /// Returns `None` for bytes this build does not know, and for tags that
    /// did not exist yet in `version`.
    pub fn from_byte(b: u8, version: VersionTag) -> Option<Self> {
        match b {
            0 => Some(Self::Null),
            1 => Some(Self::Bool),
            2 => Some(Self::Integer),
            3 => Some(Self::Bytes),
            4 => Some(Self::Text),
            5 => Some(Self::Array),
            6 if version >= VersionTag::V2 => Some(Self::SmallInt),
            _ => None,
        }
    }

    /// Converts the tag to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// The stock [`ObjectCodec`] for [`Value`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueCodec;

impl ValueCodec {
    fn decode_at<S: ByteSource>(
        reader: &mut VersionedReader<S>,
        version: VersionTag,
        depth: usize,
    ) -> CodecResult<Value> {
        if depth > MAX_DEPTH {
            return Err(CodecError::invalid_structure(format!(
                "value nesting deeper than {MAX_DEPTH}"
            )));
        }
        let byte = reader.read_u8()?;
        let tag = ValueTag::from_byte(byte, version)
            .ok_or_else(|| CodecError::unrecognized_schema(byte, version))?;

        match tag {
            ValueTag::Null => Ok(Value::Null),
            ValueTag::Bool => Ok(Value::Bool(reader.read_bool()?)),
            ValueTag::Integer => Ok(Value::Integer(reader.read_i64()?)),
            ValueTag::SmallInt => Ok(Value::Integer(i64::from(reader.read_i32()?))),
            ValueTag::Bytes => Ok(Value::Bytes(reader.read_byte_array()?)),
            ValueTag::Text => Ok(Value::Text(reader.read_text()?)),
            ValueTag::Array => {
                let len = reader.read_u32()?;
                if len > MAX_ARRAY_ELEMENTS {
                    return Err(CodecError::SizeLimitExceeded {
                        claimed: u64::from(len),
                        max_allowed: u64::from(MAX_ARRAY_ELEMENTS),
                    });
                }
                // Capacity is capped so a corrupt count cannot force a huge allocation.
                let mut items = Vec::with_capacity(len.min(1024) as usize);
                for _ in 0..len {
                    items.push(Self::decode_at(reader, version, depth + 1)?);
                }
                Ok(Value::Array(items))
            }
        }
    }

    fn encode_at(writer: &mut VersionedWriter, version: VersionTag, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => writer.write_u8(ValueTag::Null.as_byte()),
            Value::Bool(b) => {
                writer.write_u8(ValueTag::Bool.as_byte());
                writer.write_bool(*b);
            }
            Value::Integer(n) => match i32::try_from(*n) {
                Ok(small) if version >= VersionTag::V2 => {
                    writer.write_u8(ValueTag::SmallInt.as_byte());
                    writer.write_i32(small);
                }
                _ => {
                    writer.write_u8(ValueTag::Integer.as_byte());
                    writer.write_i64(*n);
                }
            },
            Value::Bytes(bytes) => {
                writer.write_u8(ValueTag::Bytes.as_byte());
                writer.write_byte_array(bytes)?;
            }
            Value::Text(text) => {
                writer.write_u8(ValueTag::Text.as_byte());
                writer.write_text(text)?;
            }
            Value::Array(items) => {
                let len = u32::try_from(items.len())
                    .ok()
                    .filter(|len| *len <= MAX_ARRAY_ELEMENTS)
                    .ok_or_else(|| CodecError::encoding_failed("array has too many elements"))?;
                writer.write_u8(ValueTag::Array.as_byte());
                writer.write_u32(len);
                for item in items {
                    Self::encode_at(writer, version, item)?;
                }
            }
        }
        Ok(())
    }
}

impl ObjectCodec for ValueCodec {
    type Object = Value;

    fn decode<S: ByteSource>(
        &self,
        reader: &mut VersionedReader<S>,
        version: VersionTag,
    ) -> CodecResult<Value> {
        Self::decode_at(reader, version, 0)
    }

    fn encode(
        &self,
        writer: &mut VersionedWriter,
        version: VersionTag,
        object: &Value,
    ) -> CodecResult<()> {
        Self::encode_at(writer, version, object)
    }
}
