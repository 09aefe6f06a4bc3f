//! Pluggable object-level codecs.

use crate::error::CodecResult;
use crate::reader::VersionedReader;
use crate::version::VersionTag;
use crate::writer::VersionedWriter;
use oprecover_storage::ByteSource;

/// An object-level codec reached through a versioned reader or writer.
///
/// The format version is passed explicitly rather than read back from the
/// reader, so a codec's behavior is a function of its arguments only.
/// Implementations select a version-specific strategy by comparing
/// `version` against the [`VersionTag`] that introduced a feature.
pub trait ObjectCodec {
    /// The decoded object type.
    type Object;

    /// Decodes one object.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnrecognizedSchema`](crate::CodecError::UnrecognizedSchema)
    /// if the stream encodes a type unknown under `version`, or any read error
    /// from the reader.
    fn decode<S: ByteSource>(
        &self,
        reader: &mut VersionedReader<S>,
        version: VersionTag,
    ) -> CodecResult<Self::Object>;

    /// Encodes one object.
    ///
    /// # Errors
    ///
    /// Returns an error if the object cannot be represented under `version`.
    fn encode(
        &self,
        writer: &mut VersionedWriter,
        version: VersionTag,
        object: &Self::Object,
    ) -> CodecResult<()>;
}
