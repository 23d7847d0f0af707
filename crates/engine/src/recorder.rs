//! The trace recorder
//!
//! [`Recorder`] consumes protocol messages one at a time and turns each into
//! persistence port calls. It is a small state machine:
//!
//! ```text
//!            start_run                 end_run
//!   Idle ──────────────▶ Recording ──────────────▶ Idle
//!                          │    ▲
//!                          └────┘  any other kind (trace event)
//! ```
//!
//! State only changes after the store accepted the write. After every
//! successful dispatch the message's `filename`, if any, is snapshotted once
//! per run.

use crate::config::RecorderConfig;
use crate::session::RunSession;
use crate::snapshot_cache::{FileSource, FsFileSource, SnapshotCache};
use std::path::Path;
use tracerec_core::{
    DecodedMessage, Error, Message, MessageKind, PersistenceError, ProtocolError, Result, RunEnd,
    RunId, RunStart, TraceEvent, TraceStore, END_RUN,
};
use tracerec_durability::WalTraceStore;

/// Lifecycle state of a [`Recorder`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RecorderState {
    /// No run is open
    #[default]
    Idle,
    /// Events for `run_id` are being recorded
    Recording {
        /// The open run
        run_id: RunId,
    },
}

impl RecorderState {
    /// The open run, if any
    pub fn run_id(&self) -> Option<&RunId> {
        match self {
            RecorderState::Idle => None,
            RecorderState::Recording { run_id } => Some(run_id),
        }
    }

    /// True while a run is open
    pub fn is_recording(&self) -> bool {
        matches!(self, RecorderState::Recording { .. })
    }
}

/// What happened to the file a message referenced
#[derive(Debug)]
pub enum SnapshotOutcome {
    /// The message named no file
    NotReferenced,
    /// The file was already captured in this run
    AlreadyCaptured,
    /// The file body was stored
    Captured {
        /// Size of the stored body
        bytes: usize,
    },
    /// The file could not be read; it stays eligible for capture
    Failed(Error),
}

impl SnapshotOutcome {
    /// True if a snapshot was stored for this message
    pub fn is_captured(&self) -> bool {
        matches!(self, SnapshotOutcome::Captured { .. })
    }

    /// True if the capture attempt failed
    pub fn is_failed(&self) -> bool {
        matches!(self, SnapshotOutcome::Failed(_))
    }
}

/// Result of processing one message
#[derive(Debug)]
pub struct Dispatch {
    /// Kind of the handled message
    pub kind: MessageKind,
    /// Run the message belonged to
    pub run_id: RunId,
    /// File snapshot result
    pub snapshot: SnapshotOutcome,
}

/// Counters for a [`Recorder::record`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordingSummary {
    /// Messages processed
    pub messages: u64,
    /// Runs started
    pub runs_started: u64,
    /// Runs finished
    pub runs_finished: u64,
    /// Trace events recorded
    pub events: u64,
    /// File snapshots stored
    pub snapshots: u64,
    /// File reads that failed
    pub capture_failures: u64,
}

impl RecordingSummary {
    fn count(&mut self, dispatch: &Dispatch) {
        self.messages += 1;
        match dispatch.kind {
            MessageKind::StartRun => self.runs_started += 1,
            MessageKind::EndRun => self.runs_finished += 1,
            MessageKind::Trace(_) => self.events += 1,
        }
        match dispatch.snapshot {
            SnapshotOutcome::Captured { .. } => self.snapshots += 1,
            SnapshotOutcome::Failed(_) => self.capture_failures += 1,
            SnapshotOutcome::NotReferenced | SnapshotOutcome::AlreadyCaptured => {}
        }
    }
}

/// Records a message stream into a [`TraceStore`]
pub struct Recorder<S: TraceStore, F: FileSource = FsFileSource> {
    store: S,
    state: RecorderState,
    session: RunSession,
    cache: SnapshotCache<F>,
}

impl Recorder<WalTraceStore> {
    /// Open a recorder writing to the trace log in `dir`.
    ///
    /// Writes a default `tracerec.toml` on first open, then opens the store
    /// with the configured durability and segment size.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| PersistenceError::new("open", e))?;
        let config = RecorderConfig::load_or_create(dir)?;
        let store = WalTraceStore::open(dir, config.store_config()?)
            .map_err(|e| PersistenceError::new("open", e))?;
        Ok(Recorder::new(store))
    }
}

impl<S: TraceStore> Recorder<S> {
    /// Create a recorder reading file bodies from the filesystem
    pub fn new(store: S) -> Self {
        Self::with_file_source(store, FsFileSource)
    }
}

impl<S: TraceStore, F: FileSource> Recorder<S, F> {
    /// Create a recorder reading file bodies through `source`
    pub fn with_file_source(store: S, source: F) -> Self {
        Recorder {
            store,
            state: RecorderState::Idle,
            session: RunSession::new(),
            cache: SnapshotCache::with_source(source),
        }
    }

    /// Process one message.
    ///
    /// # Errors
    ///
    /// Decoding, lifecycle and persistence failures. A file that cannot be
    /// read is not an error here; it is reported in the returned
    /// [`SnapshotOutcome`].
    pub fn process(&mut self, message: &Message) -> Result<Dispatch> {
        tracing::debug!(kind = message.kind_tag(), payload = ?message.payload(), "MESSAGE");

        let run_id = match message.decode()? {
            DecodedMessage::StartRun(start) => self.start_run(start)?,
            DecodedMessage::EndRun(end) => self.end_run(end)?,
            DecodedMessage::Trace(event) => self.trace(event)?,
        };

        let snapshot = match message.filename() {
            Some(filename) => self.capture(&run_id, filename)?,
            None => SnapshotOutcome::NotReferenced,
        };

        Ok(Dispatch {
            kind: message.kind(),
            run_id,
            snapshot,
        })
    }

    /// Process messages in order until the stream ends or a fatal error occurs.
    ///
    /// The store is flushed once the stream is exhausted.
    pub fn record<I>(&mut self, messages: I) -> Result<RecordingSummary>
    where
        I: IntoIterator<Item = Result<Message>>,
    {
        let mut summary = RecordingSummary::default();
        for message in messages {
            let dispatch = self.process(&message?)?;
            summary.count(&dispatch);
        }
        self.flush()?;
        Ok(summary)
    }

    fn start_run(&mut self, start: RunStart) -> Result<RunId> {
        if let RecorderState::Recording { run_id } = &self.state {
            return Err(ProtocolError::RunAlreadyOpen {
                open: run_id.clone(),
                requested: start.run_id,
            }
            .into());
        }

        let mut session = RunSession::new();
        let run = session.begin(start.run_id, &start.cwd, start.description, start.start_time);
        tracing::info!("Starting new run: {}", run.command_line());
        self.store.begin_run(run)?;

        let run_id = run.run_id.clone();
        self.session = session;
        self.cache.reset();
        self.state = RecorderState::Recording {
            run_id: run_id.clone(),
        };
        Ok(run_id)
    }

    fn end_run(&mut self, end: RunEnd) -> Result<RunId> {
        self.check_open_run(END_RUN, &end.run_id)?;
        tracing::info!(run_id = %end.run_id, "Finished run");
        self.store.finalize_run(&end)?;

        self.session.end();
        self.state = RecorderState::Idle;
        Ok(end.run_id)
    }

    fn trace(&mut self, event: TraceEvent) -> Result<RunId> {
        self.check_open_run(&event.event, &event.run_id)?;
        self.store.record_event(&event)?;
        Ok(event.run_id)
    }

    fn check_open_run(&self, kind: &str, run_id: &RunId) -> Result<()> {
        match &self.state {
            RecorderState::Idle => Err(ProtocolError::NoOpenRun {
                kind: kind.to_string(),
                run_id: run_id.clone(),
            }
            .into()),
            RecorderState::Recording { run_id: open } if open != run_id => {
                Err(ProtocolError::RunMismatch {
                    kind: kind.to_string(),
                    open: open.clone(),
                    received: run_id.clone(),
                }
                .into())
            }
            RecorderState::Recording { .. } => Ok(()),
        }
    }

    fn capture(&mut self, run_id: &RunId, filename: &str) -> Result<SnapshotOutcome> {
        if !self.cache.should_capture(filename) {
            return Ok(SnapshotOutcome::AlreadyCaptured);
        }

        let body = match self.cache.read_body(filename) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(run_id = %run_id, error = %e, "File snapshot skipped");
                return Ok(SnapshotOutcome::Failed(e));
            }
        };

        self.store.store_file_snapshot(run_id, filename, &body)?;
        self.cache.mark_captured(filename);
        tracing::debug!(run_id = %run_id, filename, bytes = body.len(), "Stored file snapshot");
        Ok(SnapshotOutcome::Captured { bytes: body.len() })
    }

    /// Drain any writes the store buffers
    pub fn flush(&mut self) -> Result<()> {
        self.store.flush().map_err(Error::from)
    }

    /// Current lifecycle state
    pub fn state(&self) -> &RecorderState {
        &self.state
    }

    /// Open run data, with the normalized working directory
    pub fn session(&self) -> &RunSession {
        &self.session
    }

    /// Snapshot cache for the current run
    pub fn snapshot_cache(&self) -> &SnapshotCache<F> {
        &self.cache
    }

    /// The persistence port
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutable access to the persistence port
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Consume the recorder, returning the store
    pub fn into_store(self) -> S {
        self.store
    }
}

impl<S: TraceStore + std::fmt::Debug, F: FileSource> std::fmt::Debug for Recorder<S, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("store", &self.store)
            .field("state", &self.state)
            .field("captured_files", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tracerec_durability::{MemoryTraceStore, StoreEntry};

    fn msg(kind: &str, payload: serde_json::Value) -> Message {
        Message::from_value(kind, payload).unwrap()
    }

    fn recorder() -> (Recorder<MemoryTraceStore>, MemoryTraceStore) {
        let store = MemoryTraceStore::new();
        (Recorder::new(store.clone()), store)
    }

    #[test]
    fn test_start_run_enters_recording() {
        let (mut rec, store) = recorder();
        let dispatch = rec
            .process(&msg("start_run", json!({"run_id": "r1", "cwd": "/tmp/x//"})))
            .unwrap();

        assert_eq!(dispatch.kind, MessageKind::StartRun);
        assert!(matches!(dispatch.snapshot, SnapshotOutcome::NotReferenced));
        assert_eq!(rec.state().run_id(), Some(&RunId::new("r1")));
        assert_eq!(rec.session().cwd(), Some("/tmp/x/"));
        match &store.entries()[0] {
            StoreEntry::RunBegin(start) => assert_eq!(start.cwd, "/tmp/x/"),
            other => panic!("unexpected entry: {other:?}"),
        }
    }

    #[test]
    fn test_nested_start_rejected_without_write() {
        let (mut rec, store) = recorder();
        rec.process(&msg("start_run", json!({"run_id": "r1"}))).unwrap();

        let err = rec
            .process(&msg("start_run", json!({"run_id": "r2"})))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::RunAlreadyOpen { .. })
        ));
        assert_eq!(store.len(), 1);
        assert_eq!(rec.state().run_id(), Some(&RunId::new("r1")));
    }

    #[test]
    fn test_event_while_idle_rejected() {
        let (mut rec, store) = recorder();
        let err = rec
            .process(&msg("line", json!({"run_id": "r1", "call_id": "c"})))
            .unwrap_err();
        match err {
            Error::Protocol(ProtocolError::NoOpenRun { kind, run_id }) => {
                assert_eq!(kind, "line");
                assert_eq!(run_id, RunId::new("r1"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(store.is_empty());
    }

    #[test]
    fn test_mismatched_run_rejected() {
        let (mut rec, _store) = recorder();
        rec.process(&msg("start_run", json!({"run_id": "r1"}))).unwrap();
        let err = rec
            .process(&msg("end_run", json!({"run_id": "r2"})))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::RunMismatch { .. })
        ));
        assert!(rec.state().is_recording());
    }

    #[test]
    fn test_failed_begin_leaves_state_idle() {
        let (mut rec, store) = recorder();
        store.fail_next("begin_run");

        let err = rec
            .process(&msg("start_run", json!({"run_id": "r1"})))
            .unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
        assert_eq!(rec.state(), &RecorderState::Idle);
        assert!(!rec.session().is_open());
    }

    #[test]
    fn test_failed_finalize_keeps_run_open() {
        let (mut rec, store) = recorder();
        rec.process(&msg("start_run", json!({"run_id": "r1"}))).unwrap();
        store.fail_next("finalize_run");

        assert!(rec.process(&msg("end_run", json!({"run_id": "r1"}))).is_err());
        assert!(rec.state().is_recording());

        rec.process(&msg("end_run", json!({"run_id": "r1"}))).unwrap();
        assert_eq!(rec.state(), &RecorderState::Idle);
    }

    #[test]
    fn test_non_string_filename_on_end_run_rejected() {
        let (mut rec, store) = recorder();
        rec.process(&msg("start_run", json!({"run_id": "r1"}))).unwrap();

        let err = rec
            .process(&msg("end_run", json!({"run_id": "r1", "filename": ["a.py"]})))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidField { field: "filename", .. }));
        assert!(rec.state().is_recording());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_missing_call_id_is_error() {
        let (mut rec, _store) = recorder();
        rec.process(&msg("start_run", json!({"run_id": "r1"}))).unwrap();
        let err = rec
            .process(&msg("call", json!({"run_id": "r1"})))
            .unwrap_err();
        assert!(matches!(err, Error::MissingField { field: "call_id", .. }));
    }

    #[test]
    fn test_record_flushes_and_counts() {
        let (mut rec, store) = recorder();
        let messages = vec![
            Ok(msg("start_run", json!({"run_id": 1}))),
            Ok(msg("call", json!({"run_id": 1, "call_id": 1}))),
            Ok(msg("end_run", json!({"run_id": 1}))),
        ];
        let summary = rec.record(messages).unwrap();
        assert_eq!(
            summary,
            RecordingSummary {
                messages: 3,
                runs_started: 1,
                runs_finished: 1,
                events: 1,
                snapshots: 0,
                capture_failures: 0,
            }
        );
        assert_eq!(store.flush_count(), 1);
    }

    #[test]
    fn test_record_stops_at_transport_error() {
        let (mut rec, store) = recorder();
        let messages = vec![
            Ok(msg("start_run", json!({"run_id": 1}))),
            Err(Error::MalformedMessage {
                line: 2,
                detail: "not json".to_string(),
            }),
            Ok(msg("call", json!({"run_id": 1, "call_id": 1}))),
        ];
        let err = rec.record(messages).unwrap_err();
        assert!(matches!(err, Error::MalformedMessage { line: 2, .. }));
        assert_eq!(store.len(), 1);
    }
}
