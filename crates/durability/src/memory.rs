//! In-memory trace store
//!
//! [`MemoryTraceStore`] keeps every port call as a [`StoreEntry`] in a shared
//! vector. Clones share the same entries, so a test can hand one clone to a
//! recorder and inspect the other.

use crate::format::{SnapshotEntry, StoreEntry};
use crate::trace_log::TraceLog;
use parking_lot::Mutex;
use std::sync::Arc;
use tracerec_core::{
    FileSnapshot, PersistenceError, RunEnd, RunId, RunStart, TraceEvent, TraceStore,
};

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<StoreEntry>,
    fail_next: Option<&'static str>,
    flushes: usize,
}

/// Shared in-memory implementation of the persistence port
#[derive(Debug, Clone, Default)]
pub struct MemoryTraceStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryTraceStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call to `operation` fail.
    ///
    /// `operation` is a port method name such as `"record_event"`. The
    /// failure fires once and nothing is stored for that call.
    pub fn fail_next(&self, operation: &'static str) {
        self.inner.lock().fail_next = Some(operation);
    }

    /// All entries in write order
    pub fn entries(&self) -> Vec<StoreEntry> {
        self.inner.lock().entries.clone()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// True if nothing has been stored
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Recorded trace events in write order
    pub fn events(&self) -> Vec<TraceEvent> {
        self.inner
            .lock()
            .entries
            .iter()
            .filter_map(|entry| match entry {
                StoreEntry::Event(event) => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    /// Stored file snapshots in write order
    pub fn snapshots(&self) -> Vec<FileSnapshot> {
        self.inner
            .lock()
            .entries
            .iter()
            .filter_map(|entry| match entry {
                StoreEntry::FileSnapshot(snapshot) => Some(snapshot.clone().into()),
                _ => None,
            })
            .collect()
    }

    /// Number of successful `flush` calls
    pub fn flush_count(&self) -> usize {
        self.inner.lock().flushes
    }

    /// Group the stored entries into runs
    pub fn trace_log(&self) -> TraceLog {
        TraceLog::from_entries(self.entries())
    }

    fn push(&self, operation: &'static str, entry: StoreEntry) -> Result<(), PersistenceError> {
        let mut inner = self.inner.lock();
        if inner.fail_next == Some(operation) {
            inner.fail_next = None;
            return Err(PersistenceError::new(operation, "injected failure"));
        }
        inner.entries.push(entry);
        Ok(())
    }
}

impl TraceStore for MemoryTraceStore {
    fn begin_run(&mut self, start: &RunStart) -> Result<(), PersistenceError> {
        self.push("begin_run", StoreEntry::RunBegin(start.clone()))
    }

    fn finalize_run(&mut self, end: &RunEnd) -> Result<(), PersistenceError> {
        self.push("finalize_run", StoreEntry::RunEnd(end.clone()))
    }

    fn record_event(&mut self, event: &TraceEvent) -> Result<(), PersistenceError> {
        self.push("record_event", StoreEntry::Event(event.clone()))
    }

    fn store_file_snapshot(
        &mut self,
        run_id: &RunId,
        filename: &str,
        body: &[u8],
    ) -> Result<(), PersistenceError> {
        self.push(
            "store_file_snapshot",
            StoreEntry::FileSnapshot(SnapshotEntry {
                run_id: run_id.clone(),
                filename: filename.to_string(),
                body: body.to_vec(),
            }),
        )
    }

    fn flush(&mut self) -> Result<(), PersistenceError> {
        let mut inner = self.inner.lock();
        if inner.fail_next == Some("flush") {
            inner.fail_next = None;
            return Err(PersistenceError::new("flush", "injected failure"));
        }
        inner.flushes += 1;
        Ok(())
    }
}
