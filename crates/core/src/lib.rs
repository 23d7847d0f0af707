//! Core types and traits for tracerec
//!
//! This crate defines the foundational types used throughout the system:
//! - RunId / CallId: caller-assigned identifiers for runs and calls
//! - Timestamp: microsecond-precision time
//! - Message: the `(kind, payload)` protocol message and its typed decoding
//! - RunStart / RunEnd / RunRecord / RunStatus: run lifecycle types
//! - TraceEvent / FileSnapshot: the recorded data
//! - Error: error type hierarchy
//! - TraceStore: the persistence port the recorder writes through

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod event;
pub mod message;
pub mod run_types;
pub mod timestamp;
pub mod traits;
pub mod types;

pub use error::{BoxError, Error, PersistenceError, ProtocolError, Result};
pub use event::{FileSnapshot, TraceEvent};
pub use message::{DecodedMessage, Message, MessageKind, END_RUN, START_RUN};
pub use run_types::{RunEnd, RunRecord, RunStart, RunStatus};
pub use timestamp::Timestamp;
pub use traits::TraceStore;
pub use types::{CallId, RunId};
