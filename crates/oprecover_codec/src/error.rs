//! Error types for the codec crate.

use crate::version::VersionTag;
use oprecover_storage::StorageError;
use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The source ran out before a value was complete.
    #[error("unexpected end of input: needed {needed} bytes, {available} available")]
    UnexpectedEof {
        /// Bytes the decoder asked for.
        needed: usize,
        /// Bytes the source still had.
        available: u64,
    },

    /// The underlying source failed.
    #[error("source error: {message}")]
    Source {
        /// Description of the source failure.
        message: String,
    },

    /// The source was closed.
    #[error("source is closed")]
    Closed,

    /// The stream encodes a type this build does not know.
    #[error("unrecognized schema tag {tag:#04x} for format {version}")]
    UnrecognizedSchema {
        /// The offending type tag.
        tag: u8,
        /// Version the stream was decoded under.
        version: VersionTag,
    },

    /// The stream was produced by a format this build cannot read.
    #[error("unsupported format version {ordinal} (this build reads up to {max_supported})")]
    UnsupportedVersion {
        /// Ordinal found in the stream.
        ordinal: u16,
        /// Highest ordinal this build understands.
        max_supported: u16,
    },

    /// Invalid UTF-8 text.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// A UTF-16 code unit that is not a valid scalar value.
    #[error("invalid char code unit {code:#06x}")]
    InvalidChar {
        /// The raw code unit.
        code: u16,
    },

    /// A length prefix exceeded the allowed maximum.
    #[error("size limit exceeded: claimed {claimed}, max allowed {max_allowed}")]
    SizeLimitExceeded {
        /// Length claimed by the stream.
        claimed: u64,
        /// Maximum accepted length.
        max_allowed: u64,
    },

    /// Invalid structure.
    #[error("invalid structure: {message}")]
    InvalidStructure {
        /// Description of the structural error.
        message: String,
    },

    /// A value cannot be represented under the writer's format version.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },
}

impl CodecError {
    /// Create an unrecognized schema error.
    pub fn unrecognized_schema(tag: u8, version: VersionTag) -> Self {
        Self::UnrecognizedSchema { tag, version }
    }

    /// Create an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Returns true if the error was caused by running out of input.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::UnexpectedEof { .. })
    }
}

impl From<StorageError> for CodecError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ReadPastEnd { offset, len, size } => Self::UnexpectedEof {
                needed: len,
                available: size.saturating_sub(offset),
            },
            StorageError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Self::UnexpectedEof {
                    needed: 0,
                    available: 0,
                }
            }
            StorageError::Io(e) => Self::Source {
                message: e.to_string(),
            },
            StorageError::Closed => Self::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_past_end_maps_to_eof() {
        let err: CodecError = StorageError::ReadPastEnd {
            offset: 6,
            len: 4,
            size: 8,
        }
        .into();
        assert_eq!(
            err,
            CodecError::UnexpectedEof {
                needed: 4,
                available: 2
            }
        );
        assert!(err.is_eof());
    }

    #[test]
    fn io_fault_maps_to_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: CodecError = StorageError::Io(io).into();
        assert!(matches!(err, CodecError::Source { .. }));
    }

    #[test]
    fn unrecognized_schema_names_version() {
        let err = CodecError::unrecognized_schema(0x06, VersionTag::V1);
        assert_eq!(err.to_string(), "unrecognized schema tag 0x06 for format v1");
    }
}
