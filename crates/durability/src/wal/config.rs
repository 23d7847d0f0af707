//! Trace log configuration.

/// Trace log configuration parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalConfig {
    /// Maximum segment size in bytes (default: 64MB).
    ///
    /// When appending a record would exceed this size, a new segment is created.
    pub segment_size: u64,
}

impl Default for WalConfig {
    fn default() -> Self {
        WalConfig {
            segment_size: 64 * 1024 * 1024, // 64MB
        }
    }
}

impl WalConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set segment size (builder pattern).
    pub fn with_segment_size(mut self, size: u64) -> Self {
        self.segment_size = size;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), WalConfigError> {
        if self.segment_size < 1024 {
            return Err(WalConfigError::SegmentSizeTooSmall);
        }
        Ok(())
    }

    /// Create a configuration optimized for testing (small segments).
    pub fn for_testing() -> Self {
        WalConfig {
            segment_size: 64 * 1024, // 64KB for faster rotation in tests
        }
    }
}

/// Trace log configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalConfigError {
    /// Segment size is too small (minimum 1KB).
    #[error("Segment size must be at least 1KB")]
    SegmentSizeTooSmall,
}
