//! Trace events and file snapshots

use crate::timestamp::Timestamp;
use crate::types::{CallId, RunId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// One observed instrumentation point (call, line, return, exception, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Run the event belongs to
    pub run_id: RunId,
    /// Function invocation the event belongs to
    pub call_id: CallId,
    /// Event kind tag as sent by the tracer
    pub event: String,
    /// Name of the executing function
    pub func_name: Option<String>,
    /// Line number being executed
    pub line_no: Option<u64>,
    /// Source file being executed
    pub filename: Option<String>,
    /// Kind-specific payload (return value, exception info, ...)
    pub trace_arg: Option<JsonValue>,
    /// Local variables, name to serialized value
    pub local_vars: Option<Map<String, JsonValue>>,
    /// When the event was observed
    pub timestamp: Option<Timestamp>,
}

/// Byte content of a source file, captured once per run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSnapshot {
    /// Run the snapshot belongs to
    pub run_id: RunId,
    /// Filename exactly as referenced by the triggering message
    pub filename: String,
    /// Raw file content
    pub body: Vec<u8>,
}
