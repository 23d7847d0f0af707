//! Recording engine for tracerec
//!
//! This crate turns a stream of tracer messages into persistence port calls:
//! - Recorder: the run lifecycle state machine (start_run, events, end_run)
//! - Run session: the open run and its normalized working directory
//! - Snapshot cache: once-per-run capture of referenced source files
//! - Transport: JSON-lines message source
//! - Configuration: `tracerec.toml` in the trace directory
//!
//! The engine is the only component that knows about:
//! - Run lifecycle validation
//! - When file bodies are read and stored

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod recorder;
pub mod session;
pub mod snapshot_cache;
pub mod transport;

pub use config::{RecorderConfig, CONFIG_FILE_NAME};
pub use recorder::{Dispatch, Recorder, RecorderState, RecordingSummary, SnapshotOutcome};
pub use session::{normalize_cwd, RunSession};
pub use snapshot_cache::{FileSource, FsFileSource, SnapshotCache};
pub use transport::JsonLinesSource;
