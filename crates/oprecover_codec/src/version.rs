//! Format version tags.

use crate::error::{CodecError, CodecResult};
use std::fmt;

/// Identifier of the format version that produced a byte stream.
///
/// Tags are totally ordered: a codec picks its decode strategy by comparing
/// the tag it was handed against the version that introduced a feature.
///
/// | Tag  | Changes                                                    |
/// |------|------------------------------------------------------------|
/// | `V1` | initial format; text has a u16 length prefix; no stamps     |
/// | `V2` | u32 text length prefix; entry stamps; compact small ints   |
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionTag(u16);

impl VersionTag {
    /// The initial format.
    pub const V1: Self = Self(1);

    /// Wide text prefixes, entry stamps, compact small integers.
    pub const V2: Self = Self(2);

    /// The format written by this build.
    pub const CURRENT: Self = Self::V2;

    /// Builds a tag from its on-disk ordinal.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnsupportedVersion`] for ordinal 0 and for
    /// ordinals newer than [`VersionTag::CURRENT`].
    pub fn from_ordinal(ordinal: u16) -> CodecResult<Self> {
        if ordinal == 0 || ordinal > Self::CURRENT.0 {
            return Err(CodecError::UnsupportedVersion {
                ordinal,
                max_supported: Self::CURRENT.0,
            });
        }
        Ok(Self(ordinal))
    }

    /// Returns the on-disk ordinal.
    #[must_use]
    pub const fn ordinal(self) -> u16 {
        self.0
    }

    /// Returns true if text length prefixes are four bytes wide.
    #[must_use]
    pub fn has_wide_text(self) -> bool {
        self >= Self::V2
    }

    /// Returns true if create and update records carry a stamp.
    #[must_use]
    pub fn has_stamps(self) -> bool {
        self >= Self::V2
    }
}

impl Default for VersionTag {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_ordered() {
        assert!(VersionTag::V1 < VersionTag::V2);
        assert_eq!(VersionTag::CURRENT, VersionTag::V2);
    }

    #[test]
    fn from_ordinal_accepts_known() {
        assert_eq!(VersionTag::from_ordinal(1).unwrap(), VersionTag::V1);
        assert_eq!(VersionTag::from_ordinal(2).unwrap(), VersionTag::V2);
    }

    #[test]
    fn from_ordinal_rejects_unknown() {
        assert!(matches!(
            VersionTag::from_ordinal(0),
            Err(CodecError::UnsupportedVersion { ordinal: 0, .. })
        ));
        assert!(matches!(
            VersionTag::from_ordinal(9),
            Err(CodecError::UnsupportedVersion {
                ordinal: 9,
                max_supported: 2
            })
        ));
    }

    #[test]
    fn feature_gates() {
        assert!(!VersionTag::V1.has_wide_text());
        assert!(!VersionTag::V1.has_stamps());
        assert!(VersionTag::V2.has_wide_text());
        assert!(VersionTag::V2.has_stamps());
    }

    #[test]
    fn display() {
        assert_eq!(VersionTag::V2.to_string(), "v2");
    }
}
