//! Error types for the trace recorder
//!
//! This module defines all error types surfaced to callers of the recorder.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Only `Error::FileCapture` is recoverable: the triggering event is already
//! persisted and the file stays eligible for capture on a later event.
//! Every other variant stops processing of the message stream.

use crate::types::RunId;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for recorder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed source error carried by [`PersistenceError`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error types for the trace recorder
#[derive(Debug, Error)]
pub enum Error {
    /// Message sequence violates the run lifecycle
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Required payload field absent
    #[error("Missing field '{field}' in '{kind}' message")]
    MissingField {
        /// Message kind tag
        kind: String,
        /// Name of the absent field
        field: &'static str,
    },

    /// Payload field present with the wrong JSON type
    #[error("Invalid field '{field}' in '{kind}' message: expected {expected}")]
    InvalidField {
        /// Message kind tag
        kind: String,
        /// Name of the offending field
        field: &'static str,
        /// Human-readable description of the accepted shape
        expected: &'static str,
    },

    /// File body could not be read for a snapshot
    #[error("Failed to capture file {}: {source}", path.display())]
    FileCapture {
        /// Path taken from the message's `filename` field
        path: PathBuf,
        /// Underlying read failure
        #[source]
        source: io::Error,
    },

    /// The persistence port rejected a write
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// A transport line could not be decoded into a message
    #[error("Malformed message on line {line}: {detail}")]
    MalformedMessage {
        /// 1-based line number in the transport stream
        line: usize,
        /// Decoder diagnostic
        detail: String,
    },

    /// Reading from the transport failed
    #[error("Transport error: {0}")]
    Transport(#[source] io::Error),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error must stop processing of the message stream
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::FileCapture { .. })
    }

    pub(crate) fn missing(kind: &str, field: &'static str) -> Self {
        Error::MissingField {
            kind: kind.to_string(),
            field,
        }
    }

    pub(crate) fn invalid(kind: &str, field: &'static str, expected: &'static str) -> Self {
        Error::InvalidField {
            kind: kind.to_string(),
            field,
            expected,
        }
    }
}

/// Run lifecycle violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A trace event or `end_run` arrived while no run was open
    #[error("'{kind}' for run {run_id} received with no open run")]
    NoOpenRun {
        /// Message kind tag
        kind: String,
        /// Run named by the message
        run_id: RunId,
    },

    /// `start_run` arrived while another run was still open
    #[error("start_run for run {requested} received while run {open} is still open")]
    RunAlreadyOpen {
        /// The run currently being recorded
        open: RunId,
        /// The run the message tried to start
        requested: RunId,
    },

    /// Message names a run other than the open one
    #[error("'{kind}' names run {received} but run {open} is open")]
    RunMismatch {
        /// Message kind tag
        kind: String,
        /// The run currently being recorded
        open: RunId,
        /// Run named by the message
        received: RunId,
    },
}

/// Failure reported by a [`TraceStore`](crate::traits::TraceStore) implementation
#[derive(Debug, Error)]
#[error("Persistence error during {operation}: {source}")]
pub struct PersistenceError {
    /// Port operation that failed (`begin_run`, `record_event`, ...)
    pub operation: &'static str,
    /// Store-specific cause
    #[source]
    pub source: BoxError,
}

impl PersistenceError {
    /// Wrap a store-specific error
    pub fn new(operation: &'static str, source: impl Into<BoxError>) -> Self {
        PersistenceError {
            operation,
            source: source.into(),
        }
    }
}
