//! Store configuration
//!
//! Configuration for trace log persistence: durability mode and segment
//! settings.

use crate::wal::{DurabilityMode, WalConfig, WalConfigError};

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoreConfig {
    /// Durability mode for appends
    pub durability: DurabilityMode,
    /// Segment configuration
    pub wal_config: WalConfig,
}

impl StoreConfig {
    /// Create config with strict durability
    ///
    /// Every record is fsynced before the port call returns.
    pub fn strict() -> Self {
        StoreConfig {
            durability: DurabilityMode::Always,
            ..Default::default()
        }
    }

    /// Create config for testing
    ///
    /// Uses strict durability and small segments.
    pub fn for_testing() -> Self {
        StoreConfig {
            durability: DurabilityMode::Always,
            wal_config: WalConfig::for_testing(),
        }
    }

    /// Set durability mode
    pub fn with_durability(mut self, mode: DurabilityMode) -> Self {
        self.durability = mode;
        self
    }

    /// Set segment size
    pub fn with_segment_size(mut self, size: u64) -> Self {
        self.wal_config.segment_size = size;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.wal_config.validate()?;
        if let DurabilityMode::Standard { batch_size: 0 } = self.durability {
            return Err(ConfigError::ZeroBatchSize);
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Invalid segment configuration
    #[error("Invalid trace log config: {0}")]
    InvalidWalConfig(#[from] WalConfigError),

    /// Standard durability with a batch size of zero
    #[error("Standard durability requires a batch size of at least 1")]
    ZeroBatchSize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.durability, DurabilityMode::standard_default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_strict_config() {
        assert_eq!(StoreConfig::strict().durability, DurabilityMode::Always);
    }

    #[test]
    fn test_builder_pattern() {
        let config = StoreConfig::default()
            .with_durability(DurabilityMode::Always)
            .with_segment_size(1024 * 1024);

        assert_eq!(config.durability, DurabilityMode::Always);
        assert_eq!(config.wal_config.segment_size, 1024 * 1024);
    }

    #[test]
    fn test_validate_invalid_segment_size() {
        let config = StoreConfig::default().with_segment_size(10);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWalConfig(WalConfigError::SegmentSizeTooSmall))
        ));
    }

    #[test]
    fn test_validate_zero_batch() {
        let config =
            StoreConfig::default().with_durability(DurabilityMode::Standard { batch_size: 0 });
        assert_eq!(config.validate(), Err(ConfigError::ZeroBatchSize));
    }

    #[test]
    fn test_for_testing() {
        let config = StoreConfig::for_testing();
        assert!(config.validate().is_ok());
        assert!(config.wal_config.segment_size < 1024 * 1024);
    }
}
