//! Core type definitions.

use serde::Serialize;
use std::fmt;

/// Identifier of one oplog segment.
///
/// Oplog ids are monotonically increasing: a higher id was written later,
/// and replay visits oplogs in ascending id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct OplogId(pub u64);

impl OplogId {
    /// Creates a new oplog id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OplogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "oplog:{}", self.0)
    }
}

/// Version stamp recorded with a create or update.
///
/// Stamps order by region version first, then entry version. Segments
/// written by formats without stamps decode as [`Stamp::UNSTAMPED`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Stamp {
    /// Region-wide version at the time of the mutation.
    pub region_version: u64,
    /// Per-entry version counter.
    pub entry_version: u32,
}

impl Stamp {
    /// The stamp of records that carry none.
    pub const UNSTAMPED: Self = Self {
        region_version: 0,
        entry_version: 0,
    };

    /// Creates a new stamp.
    #[must_use]
    pub const fn new(entry_version: u32, region_version: u64) -> Self {
        Self {
            region_version,
            entry_version,
        }
    }

    /// Returns true if this is [`Stamp::UNSTAMPED`].
    #[must_use]
    pub fn is_unstamped(&self) -> bool {
        *self == Self::UNSTAMPED
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}@r{}", self.entry_version, self.region_version)
    }
}
