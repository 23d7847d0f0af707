//! tracerec - durable recorder for execution-trace event streams
//!
//! A tracer instrumenting a running program sends `start_run`, trace events
//! (`call`, `line`, `return`, `exception`, ...) and `end_run` messages. The
//! recorder validates the run lifecycle, persists every message in order and
//! stores each referenced source file once per run.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::io::stdin;
//! use tracerec::{JsonLinesSource, Recorder};
//!
//! // Trace log and tracerec.toml live in ./traces
//! let mut recorder = Recorder::open("traces")?;
//! let summary = recorder.record(JsonLinesSource::new(stdin().lock()))?;
//!
//! // Read everything back grouped by run
//! let log = tracerec::TraceLog::load("traces")?;
//! ```
//!
//! # Architecture
//!
//! - `tracerec-core`: message model, run/event types, errors, the `TraceStore` port
//! - `tracerec-durability`: segmented trace log, in-memory store, replay
//! - `tracerec-engine`: the recorder state machine, snapshot cache, transport

pub use tracerec_core::{
    CallId, DecodedMessage, Error, FileSnapshot, Message, MessageKind, PersistenceError,
    ProtocolError, Result, RunEnd, RunId, RunRecord, RunStart, RunStatus, Timestamp, TraceEvent,
    TraceStore,
};
pub use tracerec_durability::{
    DurabilityMode, MemoryTraceStore, RunHistory, StoreConfig, StoreEntry, StoreError, TraceLog,
    WalTraceStore,
};
pub use tracerec_engine::{
    normalize_cwd, Dispatch, FileSource, FsFileSource, JsonLinesSource, Recorder, RecorderConfig,
    RecorderState, RecordingSummary, SnapshotOutcome,
};
