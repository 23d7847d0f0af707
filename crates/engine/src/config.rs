//! Recorder configuration via `tracerec.toml`
//!
//! On first open, a default `tracerec.toml` is written into the trace
//! directory. To change settings, edit the file and restart the recorder.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracerec_core::{Error, Result};
use tracerec_durability::{DurabilityMode, StoreConfig};

/// Config file name placed in the trace directory.
pub const CONFIG_FILE_NAME: &str = "tracerec.toml";

/// Recorder configuration loaded from `tracerec.toml`.
///
/// # Example
///
/// ```toml
/// # "standard" = fsync every `sync_batch` records, may lose the last batch on crash
/// # "always"   = fsync every record
/// durability = "standard"
/// sync_batch = 256
/// # segment_size = 67108864
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecorderConfig {
    /// Durability mode: `"standard"` or `"always"`.
    ///
    /// `"standard"` returns from each store call before the record is
    /// fsynced, so a power loss can drop up to `sync_batch - 1` acknowledged
    /// records. Use `"always"` when every acknowledged write must survive.
    #[serde(default = "default_durability_str")]
    pub durability: String,
    /// Records between fsyncs in standard mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_batch: Option<usize>,
    /// Segment size in bytes before rotation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_size: Option<u64>,
}

fn default_durability_str() -> String {
    "standard".to_string()
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            durability: default_durability_str(),
            sync_batch: None,
            segment_size: None,
        }
    }
}

impl RecorderConfig {
    /// Parse the durability settings into a `DurabilityMode`.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not `"standard"` or `"always"`.
    pub fn durability_mode(&self) -> Result<DurabilityMode> {
        match self.durability.as_str() {
            "standard" => Ok(match self.sync_batch {
                Some(batch_size) => DurabilityMode::Standard { batch_size },
                None => DurabilityMode::standard_default(),
            }),
            "always" => Ok(DurabilityMode::Always),
            other => Err(Error::Config(format!(
                "Invalid durability mode '{}' in {}. Expected \"standard\" or \"always\".",
                other, CONFIG_FILE_NAME
            ))),
        }
    }

    /// Build and validate the store configuration.
    pub fn store_config(&self) -> Result<StoreConfig> {
        let mut config = StoreConfig::default().with_durability(self.durability_mode()?);
        if let Some(size) = self.segment_size {
            config = config.with_segment_size(size);
        }
        config
            .validate()
            .map_err(|e| Error::Config(format!("{} in {}", e, CONFIG_FILE_NAME)))?;
        Ok(config)
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# tracerec configuration
#
# Durability mode: "standard" (default) or "always"
#   "standard" = fsync every `sync_batch` records and on shutdown;
#                a power loss can drop the last unsynced batch
#   "always"   = fsync every record, nothing lost on crash
durability = "standard"

# Records between fsyncs in standard mode (default: 256)
# sync_batch = 256

# Trace log segment size in bytes (default: 64 MiB)
# segment_size = 67108864
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: RecorderConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        // Validate eagerly
        config.store_config()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Load `tracerec.toml` from `dir`, writing the default first if absent.
    pub fn load_or_create(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        Self::write_default_if_missing(&path)?;
        Self::from_file(&path)
    }
}
