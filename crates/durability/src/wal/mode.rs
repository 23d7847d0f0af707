//! Durability mode configuration
//!
//! Controls when the trace log is fsynced to disk.

/// Durability mode for trace log appends
///
/// | Mode | fsync | Data Loss Window |
/// |------|-------|-----------------|
/// | Always | Every record | Zero |
/// | Standard | Every `batch_size` records, on flush and on close | Up to `batch_size - 1` records |
///
/// Records are written to the segment file in both modes before the append
/// returns; only the fsync is deferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurabilityMode {
    /// fsync after every record
    Always,

    /// fsync every N records
    Standard {
        /// Maximum records between fsyncs
        batch_size: usize,
    },
}

impl DurabilityMode {
    /// Check if this mode requires immediate fsync on every record
    pub fn requires_immediate_fsync(&self) -> bool {
        matches!(self, DurabilityMode::Always)
    }

    /// Human-readable description of the mode
    pub fn description(&self) -> &'static str {
        match self {
            DurabilityMode::Always => "Always sync (safest, slowest)",
            DurabilityMode::Standard { .. } => "Standard (batched fsync)",
        }
    }

    /// Create a standard mode with the recommended batch size
    ///
    /// Returns `Standard { batch_size: 256 }`.
    pub fn standard_default() -> Self {
        DurabilityMode::Standard { batch_size: 256 }
    }
}

impl Default for DurabilityMode {
    fn default() -> Self {
        Self::standard_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_standard() {
        assert_eq!(
            DurabilityMode::default(),
            DurabilityMode::Standard { batch_size: 256 }
        );
        assert!(!DurabilityMode::default().requires_immediate_fsync());
    }

    #[test]
    fn test_always_requires_fsync() {
        assert!(DurabilityMode::Always.requires_immediate_fsync());
        assert!(DurabilityMode::Always.description().contains("Always"));
    }
}
