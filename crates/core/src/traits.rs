//! The persistence port
//!
//! [`TraceStore`] is the interface the recorder writes through. It lets a
//! write-ahead log, an in-memory buffer or a remote service sit behind the
//! same recorder without changes to the dispatch logic.

use crate::error::PersistenceError;
use crate::event::TraceEvent;
use crate::run_types::{RunEnd, RunStart};
use crate::types::RunId;

/// Durable storage for runs, trace events and file snapshots
///
/// Every method must return only after the write is committed, or queued
/// with at-least-once delivery. A store may trade power-loss durability for
/// throughput if it says so: the segmented log in its default `standard`
/// mode returns once a record reaches the OS and fsyncs in batches, so a
/// crash of the machine (not of the recorder) can lose the last unsynced
/// batch. [`flush`](TraceStore::flush) closes that window.
///
/// A call that returns an error must leave no trace of the failed write
/// that could disturb later writes. Implementations are not assumed to be
/// idempotent: the recorder's run lifecycle and snapshot cache are the only
/// guard against duplicate snapshot writes.
///
/// Calls arrive strictly in message order from a single recorder; an
/// implementation shared between recorders must serialize conflicting
/// writes itself.
pub trait TraceStore {
    /// Record the start of a run
    ///
    /// `run.cwd` is already normalized.
    ///
    /// # Errors
    ///
    /// Returns an error if the write could not be committed.
    fn begin_run(&mut self, run: &RunStart) -> Result<(), PersistenceError>;

    /// Record the end of a run
    ///
    /// # Errors
    ///
    /// Returns an error if the write could not be committed.
    fn finalize_run(&mut self, end: &RunEnd) -> Result<(), PersistenceError>;

    /// Record one trace event
    ///
    /// # Errors
    ///
    /// Returns an error if the write could not be committed.
    fn record_event(&mut self, event: &TraceEvent) -> Result<(), PersistenceError>;

    /// Store the body of a source file referenced during a run
    ///
    /// # Errors
    ///
    /// Returns an error if the write could not be committed.
    fn store_file_snapshot(
        &mut self,
        run_id: &RunId,
        filename: &str,
        body: &[u8],
    ) -> Result<(), PersistenceError>;

    /// Force buffered writes to durable media
    ///
    /// # Errors
    ///
    /// Returns an error if the flush failed.
    fn flush(&mut self) -> Result<(), PersistenceError> {
        Ok(())
    }
}

impl<S: TraceStore + ?Sized> TraceStore for &mut S {
    fn begin_run(&mut self, run: &RunStart) -> Result<(), PersistenceError> {
        (**self).begin_run(run)
    }

    fn finalize_run(&mut self, end: &RunEnd) -> Result<(), PersistenceError> {
        (**self).finalize_run(end)
    }

    fn record_event(&mut self, event: &TraceEvent) -> Result<(), PersistenceError> {
        (**self).record_event(event)
    }

    fn store_file_snapshot(
        &mut self,
        run_id: &RunId,
        filename: &str,
        body: &[u8],
    ) -> Result<(), PersistenceError> {
        (**self).store_file_snapshot(run_id, filename, body)
    }

    fn flush(&mut self) -> Result<(), PersistenceError> {
        (**self).flush()
    }
}

impl<S: TraceStore + ?Sized> TraceStore for Box<S> {
    fn begin_run(&mut self, run: &RunStart) -> Result<(), PersistenceError> {
        (**self).begin_run(run)
    }

    fn finalize_run(&mut self, end: &RunEnd) -> Result<(), PersistenceError> {
        (**self).finalize_run(end)
    }

    fn record_event(&mut self, event: &TraceEvent) -> Result<(), PersistenceError> {
        (**self).record_event(event)
    }

    fn store_file_snapshot(
        &mut self,
        run_id: &RunId,
        filename: &str,
        body: &[u8],
    ) -> Result<(), PersistenceError> {
        (**self).store_file_snapshot(run_id, filename, body)
    }

    fn flush(&mut self) -> Result<(), PersistenceError> {
        (**self).flush()
    }
}
