//! Replaying a stored trace log into per-run histories
//!
//! Entries are grouped in write order: a `RunBegin` opens a new history and
//! later entries naming that run attach to it. A run that never saw its
//! `RunEnd` is `Active` when it is the newest run in the log and `Orphaned`
//! otherwise (the recorder went away without an `end_run`).

use crate::error::StoreError;
use crate::format::StoreEntry;
use crate::wal::WalReader;
use std::path::Path;
use tracerec_core::{CallId, FileSnapshot, RunId, RunRecord, RunStatus, TraceEvent};

/// Everything recorded for one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunHistory {
    /// Run metadata and exit information
    pub run: RunRecord,
    /// Lifecycle status as of the end of the log
    pub status: RunStatus,
    /// Trace events in arrival order
    pub events: Vec<TraceEvent>,
    /// File snapshots in capture order
    pub snapshots: Vec<FileSnapshot>,
}

impl RunHistory {
    fn new(run: RunRecord) -> Self {
        RunHistory {
            run,
            status: RunStatus::Active,
            events: Vec::new(),
            snapshots: Vec::new(),
        }
    }

    /// Run identifier
    pub fn run_id(&self) -> &RunId {
        &self.run.run_id
    }

    /// Events belonging to one function invocation
    pub fn events_for_call<'a>(
        &'a self,
        call_id: &'a CallId,
    ) -> impl Iterator<Item = &'a TraceEvent> + 'a {
        self.events.iter().filter(move |e| &e.call_id == call_id)
    }

    /// Snapshot stored for `filename`, if any
    pub fn snapshot(&self, filename: &str) -> Option<&FileSnapshot> {
        self.snapshots.iter().find(|s| s.filename == filename)
    }
}

/// A trace log grouped into runs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceLog {
    runs: Vec<RunHistory>,
    dangling: usize,
}

impl TraceLog {
    /// Read every segment in `dir` and group the entries.
    ///
    /// Read-only: a torn tail is ignored, not truncated.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let scan = WalReader::new().read_all(dir.as_ref())?;
        let entries = scan
            .records
            .iter()
            .map(|record| StoreEntry::decode(&record.entry))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_entries(entries))
    }

    /// Group entries that are already in write order.
    pub fn from_entries(entries: impl IntoIterator<Item = StoreEntry>) -> Self {
        let mut log = TraceLog::default();
        for entry in entries {
            log.apply(entry);
        }
        log
    }

    fn apply(&mut self, entry: StoreEntry) {
        match entry {
            StoreEntry::RunBegin(start) => {
                for run in self.runs.iter_mut().filter(|r| r.status.is_active()) {
                    run.status = RunStatus::Orphaned;
                }
                self.runs.push(RunHistory::new(RunRecord::started(&start)));
            }
            StoreEntry::RunEnd(end) => match self.latest_mut(&end.run_id) {
                Some(history) => {
                    history.run.finish(&end);
                    history.status = RunStatus::Completed;
                }
                None => self.dangle("run_end", &end.run_id),
            },
            StoreEntry::Event(event) => match self.latest_mut(&event.run_id) {
                Some(history) => history.events.push(event),
                None => self.dangle("event", &event.run_id),
            },
            StoreEntry::FileSnapshot(snapshot) => match self.latest_mut(&snapshot.run_id) {
                Some(history) => history.snapshots.push(snapshot.into()),
                None => self.dangle("file_snapshot", &snapshot.run_id),
            },
        }
    }

    fn latest_mut(&mut self, run_id: &RunId) -> Option<&mut RunHistory> {
        self.runs.iter_mut().rev().find(|r| &r.run.run_id == run_id)
    }

    fn dangle(&mut self, kind: &'static str, run_id: &RunId) {
        tracing::warn!(kind, run_id = %run_id, "Trace log entry names a run with no start");
        self.dangling += 1;
    }

    /// All runs in start order
    pub fn runs(&self) -> &[RunHistory] {
        &self.runs
    }

    /// Most recent run with this identifier
    pub fn run(&self, run_id: &RunId) -> Option<&RunHistory> {
        self.runs.iter().rev().find(|r| &r.run.run_id == run_id)
    }

    /// Number of runs
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// True if the log holds no runs
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Entries that referenced a run never started in this log
    pub fn dangling_entries(&self) -> usize {
        self.dangling
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::SnapshotEntry;
    use serde_json::json;
    use tracerec_core::{RunEnd, RunStart, Timestamp};

    fn begin(run_id: &str) -> StoreEntry {
        StoreEntry::RunBegin(RunStart {
            run_id: RunId::new(run_id),
            cwd: "/home/u/proj/".to_string(),
            description: vec!["main.py".to_string(), "--fast".to_string()],
            start_time: Some(Timestamp::from_secs(10)),
        })
    }

    fn end(run_id: &str) -> StoreEntry {
        StoreEntry::RunEnd(RunEnd {
            run_id: RunId::new(run_id),
            end_time: Some(Timestamp::from_secs(20)),
            message: Some("boom".to_string()),
            traceback: Some(json!(["frame 1"])),
        })
    }

    fn event(run_id: &str, call_id: &str, kind: &str) -> StoreEntry {
        StoreEntry::Event(TraceEvent {
            run_id: RunId::new(run_id),
            call_id: CallId::new(call_id),
            event: kind.to_string(),
            func_name: Some("f".to_string()),
            line_no: Some(3),
            filename: Some("main.py".to_string()),
            trace_arg: None,
            local_vars: None,
            timestamp: None,
        })
    }

    fn snapshot(run_id: &str, filename: &str) -> StoreEntry {
        StoreEntry::FileSnapshot(SnapshotEntry {
            run_id: RunId::new(run_id),
            filename: filename.to_string(),
            body: b"print(1)\n".to_vec(),
        })
    }

    #[test]
    fn test_completed_run() {
        let log = TraceLog::from_entries(vec![
            begin("r1"),
            event("r1", "c1", "call"),
            snapshot("r1", "main.py"),
            event("r1", "c1", "return"),
            end("r1"),
        ]);

        assert_eq!(log.len(), 1);
        let run = &log.runs()[0];
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.run.exit_message.as_deref(), Some("boom"));
        assert_eq!(run.events.len(), 2);
        assert_eq!(run.snapshot("main.py").unwrap().body, b"print(1)\n");
    }

    #[test]
    fn test_unfinished_runs() {
        let log = TraceLog::from_entries(vec![begin("r1"), begin("r2"), event("r2", "c", "line")]);

        assert_eq!(log.run(&RunId::new("r1")).unwrap().status, RunStatus::Orphaned);
        assert_eq!(log.run(&RunId::new("r2")).unwrap().status, RunStatus::Active);
    }

    #[test]
    fn test_events_for_call() {
        let log = TraceLog::from_entries(vec![
            begin("r1"),
            event("r1", "a", "call"),
            event("r1", "b", "call"),
            event("r1", "a", "return"),
        ]);
        let run = &log.runs()[0];
        let call_a = CallId::new("a");
        let kinds: Vec<&str> = run.events_for_call(&call_a).map(|e| e.event.as_str()).collect();
        assert_eq!(kinds, vec!["call", "return"]);
    }

    #[test]
    fn test_reused_run_id_attaches_to_latest() {
        let log = TraceLog::from_entries(vec![
            begin("r1"),
            end("r1"),
            begin("r1"),
            event("r1", "c", "line"),
        ]);
        assert_eq!(log.len(), 2);
        assert!(log.runs()[0].events.is_empty());
        assert_eq!(log.runs()[1].events.len(), 1);
        assert_eq!(log.runs()[1].status, RunStatus::Active);
    }

    #[test]
    fn test_dangling_entries_counted() {
        let log = TraceLog::from_entries(vec![event("ghost", "c", "line"), begin("r1")]);
        assert_eq!(log.dangling_entries(), 1);
        assert!(log.runs()[0].events.is_empty());
    }

    #[test]
    fn test_load_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log = TraceLog::load(dir.path()).unwrap();
        assert!(log.is_empty());
    }
}
