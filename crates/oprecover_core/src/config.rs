//! Recovery configuration.

/// Default upper bound on a single record payload (64 MiB).
pub const DEFAULT_MAX_RECORD_SIZE: u32 = 64 * 1024 * 1024;

/// Configuration for a recovery pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryConfig {
    /// Largest record payload accepted before the segment is declared corrupt.
    pub max_record_size: u32,

    /// Whether record checksums are verified.
    pub verify_checksums: bool,

    /// Whether a record cut short at the end of a segment is treated as the
    /// end of that segment instead of a read error.
    pub tolerate_truncated_tail: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
            verify_checksums: true,
            tolerate_truncated_tail: false,
        }
    }
}

impl RecoveryConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum record payload size.
    #[must_use]
    pub const fn max_record_size(mut self, size: u32) -> Self {
        self.max_record_size = size;
        self
    }

    /// Sets whether checksums are verified.
    #[must_use]
    pub const fn verify_checksums(mut self, value: bool) -> Self {
        self.verify_checksums = value;
        self
    }

    /// Sets whether a truncated final record ends the segment cleanly.
    #[must_use]
    pub const fn tolerate_truncated_tail(mut self, value: bool) -> Self {
        self.tolerate_truncated_tail = value;
        self
    }
}
