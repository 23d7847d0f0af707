//! Run lifecycle types
//!
//! - `RunStart`: a decoded `start_run` message, as handed to the store
//! - `RunEnd`: a decoded `end_run` message, as handed to the store
//! - `RunRecord`: the materialized run (start metadata plus end metadata)
//! - `RunStatus`: lifecycle state of a run as seen when reading a trace log

use crate::timestamp::Timestamp;
use crate::types::RunId;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Beginning of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStart {
    /// Run ID
    pub run_id: RunId,
    /// Working directory of the traced program
    ///
    /// Normalized by the recorder to end in exactly one path separator
    /// before it reaches a store. Empty when the tracer did not report one.
    pub cwd: String,
    /// Command line tokens of the traced program
    pub description: Vec<String>,
    /// When the run started
    pub start_time: Option<Timestamp>,
}

impl RunStart {
    /// The command line joined with single spaces
    pub fn command_line(&self) -> String {
        self.description.join(" ")
    }
}

/// End of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEnd {
    /// Run ID
    pub run_id: RunId,
    /// When the run ended
    pub end_time: Option<Timestamp>,
    /// Exit message reported by the tracer
    pub message: Option<String>,
    /// Exit traceback reported by the tracer, if the program failed
    pub traceback: Option<JsonValue>,
}

/// Run lifecycle status
///
/// - Active: run started, no end marker yet (the most recent run in a log)
/// - Completed: end marker recorded
/// - Orphaned: never ended although a later run started (recorder or tracer crash)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run is active (start recorded, end not yet recorded)
    Active,
    /// Run completed normally (end recorded)
    Completed,
    /// Run was never ended
    Orphaned,
}

impl RunStatus {
    /// Check if run is still active
    pub fn is_active(&self) -> bool {
        matches!(self, RunStatus::Active)
    }

    /// Check if run is completed
    pub fn is_completed(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Active => "Active",
            RunStatus::Completed => "Completed",
            RunStatus::Orphaned => "Orphaned",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A run as persisted: start metadata plus (once ended) end metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Run ID
    pub run_id: RunId,
    /// Normalized working directory
    pub cwd: String,
    /// Command line tokens
    pub description: Vec<String>,
    /// When the run started
    pub start_time: Option<Timestamp>,
    /// When the run ended
    pub end_time: Option<Timestamp>,
    /// Exit message
    pub exit_message: Option<String>,
    /// Exit traceback
    pub exit_traceback: Option<JsonValue>,
}

impl RunRecord {
    /// Create the record for a freshly started run
    pub fn started(start: &RunStart) -> Self {
        RunRecord {
            run_id: start.run_id.clone(),
            cwd: start.cwd.clone(),
            description: start.description.clone(),
            start_time: start.start_time,
            end_time: None,
            exit_message: None,
            exit_traceback: None,
        }
    }

    /// Apply end-of-run metadata
    pub fn finish(&mut self, end: &RunEnd) {
        self.end_time = end.end_time;
        self.exit_message = end.message.clone();
        self.exit_traceback = end.traceback.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> RunStart {
        RunStart {
            run_id: RunId::new("1"),
            cwd: "/tmp/proj/".to_string(),
            description: vec!["python".to_string(), "app.py".to_string()],
            start_time: Some(Timestamp::from_secs(10)),
        }
    }

    #[test]
    fn test_command_line_joins_tokens() {
        assert_eq!(start().command_line(), "python app.py");
    }

    #[test]
    fn test_record_lifecycle() {
        let mut record = RunRecord::started(&start());
        assert_eq!(record.cwd, "/tmp/proj/");
        assert!(record.end_time.is_none());

        record.finish(&RunEnd {
            run_id: RunId::new("1"),
            end_time: Some(Timestamp::from_secs(20)),
            message: Some("ok".to_string()),
            traceback: None,
        });
        assert_eq!(record.end_time, Some(Timestamp::from_secs(20)));
        assert_eq!(record.exit_message.as_deref(), Some("ok"));
        assert!(record.exit_traceback.is_none());
    }

    #[test]
    fn test_run_status_predicates() {
        assert!(RunStatus::Active.is_active());
        assert!(RunStatus::Completed.is_completed());
        assert!(!RunStatus::Orphaned.is_active());
        assert!(!RunStatus::Orphaned.is_completed());
        assert_eq!(RunStatus::Orphaned.to_string(), "Orphaned");
    }
}
