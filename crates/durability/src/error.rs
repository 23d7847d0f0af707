//! Store error types

use crate::config::ConfigError;
use crate::format::EntryCodecError;
use crate::wal::WalReaderError;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by the trace log store and reader
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure
    #[error("I/O error while {operation} at {}: {source}", path.display())]
    Io {
        /// What the store was doing
        operation: &'static str,
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Segment scan failed
    #[error(transparent)]
    Reader(#[from] WalReaderError),

    /// Entry could not be encoded or decoded
    #[error(transparent)]
    Codec(#[from] EntryCodecError),

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The log was written by an incompatible format version
    #[error("Trace log segment {segment} is incompatible: {detail}")]
    Incompatible {
        /// Segment holding the unreadable record
        segment: u64,
        /// Parser diagnostic
        detail: String,
    },
}

impl StoreError {
    pub(crate) fn io(operation: &'static str, path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display_names_path() {
        let err = StoreError::io(
            "creating store directory",
            Path::new("/tmp/traces"),
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("creating store directory"));
        assert!(msg.contains("/tmp/traces"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_incompatible_display() {
        let err = StoreError::Incompatible {
            segment: 3,
            detail: "Unsupported format version: 9".to_string(),
        };
        assert!(err.to_string().contains("segment 3"));
    }
}
