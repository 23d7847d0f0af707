//! Message model for the trace-recording protocol
//!
//! A message is a `(kind, payload)` pair: a string tag plus a JSON object of
//! named fields. Two kinds drive the run lifecycle (`start_run`, `end_run`);
//! every other tag is a generic trace event. That fallback is intentional:
//! tracers can introduce new event kinds without a recorder change.
//!
//! ## Payload fields
//!
//! | kind | required | optional |
//! |------|----------|----------|
//! | `start_run` | `run_id` | `cwd`, `command_line`, `timestamp` |
//! | `end_run` | `run_id` | `timestamp`, `message`, `traceback` |
//! | other | `run_id`, `call_id` | `func_name`, `line_no`, `filename`, `arg`, `local_vars`, `timestamp` |
//!
//! JSON `null` is treated the same as an absent field.

use crate::error::{Error, Result};
use crate::event::TraceEvent;
use crate::run_types::{RunEnd, RunStart};
use crate::timestamp::Timestamp;
use crate::types::{CallId, RunId};
use serde_json::{Map, Value as JsonValue};

/// Tag of the message that opens a run
pub const START_RUN: &str = "start_run";
/// Tag of the message that closes a run
pub const END_RUN: &str = "end_run";

/// Classified message kind
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// `start_run`
    StartRun,
    /// `end_run`
    EndRun,
    /// Any other tag: a trace event (`call`, `line`, `return`, `exception`, ...)
    Trace(String),
}

impl MessageKind {
    /// Classify a kind tag
    pub fn parse(tag: &str) -> Self {
        match tag {
            START_RUN => MessageKind::StartRun,
            END_RUN => MessageKind::EndRun,
            other => MessageKind::Trace(other.to_string()),
        }
    }

    /// The wire tag for this kind
    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::StartRun => START_RUN,
            MessageKind::EndRun => END_RUN,
            MessageKind::Trace(tag) => tag,
        }
    }

    /// Whether this kind opens or closes a run
    pub fn is_lifecycle(&self) -> bool {
        !matches!(self, MessageKind::Trace(_))
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw protocol message
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    kind: String,
    payload: Map<String, JsonValue>,
}

impl Message {
    /// Create a message from a kind tag and a payload object
    pub fn new(kind: impl Into<String>, payload: Map<String, JsonValue>) -> Self {
        Message {
            kind: kind.into(),
            payload,
        }
    }

    /// Create a message from a kind tag and an arbitrary JSON value
    ///
    /// Returns None unless `payload` is a JSON object.
    pub fn from_value(kind: impl Into<String>, payload: JsonValue) -> Option<Self> {
        match payload {
            JsonValue::Object(map) => Some(Message::new(kind, map)),
            _ => None,
        }
    }

    /// The raw kind tag
    pub fn kind_tag(&self) -> &str {
        &self.kind
    }

    /// The classified kind
    pub fn kind(&self) -> MessageKind {
        MessageKind::parse(&self.kind)
    }

    /// The payload fields
    pub fn payload(&self) -> &Map<String, JsonValue> {
        &self.payload
    }

    /// The referenced source file, if the payload names a non-empty one
    ///
    /// Applies to every kind, lifecycle messages included. A non-string
    /// value is `None` here and an `InvalidField` error from
    /// [`decode`](Self::decode).
    pub fn filename(&self) -> Option<&str> {
        self.payload
            .get("filename")
            .and_then(JsonValue::as_str)
            .filter(|name| !name.is_empty())
    }

    /// The run named by the payload, if it is well-formed
    pub fn run_id(&self) -> Option<RunId> {
        self.payload.get("run_id").and_then(RunId::from_json)
    }

    /// Decode the payload according to the kind's field contract
    ///
    /// # Errors
    ///
    /// `Error::MissingField` when `run_id` (or `call_id` for trace events) is
    /// absent, `Error::InvalidField` when a present field has the wrong type.
    pub fn decode(&self) -> Result<DecodedMessage> {
        let fields = Fields {
            kind: &self.kind,
            payload: &self.payload,
        };
        // Any kind may name a file to snapshot
        let filename = fields.string("filename")?;

        match self.kind() {
            MessageKind::StartRun => Ok(DecodedMessage::StartRun(RunStart {
                run_id: fields.run_id()?,
                cwd: fields.string("cwd")?.unwrap_or_default(),
                description: fields.string_list("command_line")?,
                start_time: fields.timestamp("timestamp")?,
            })),
            MessageKind::EndRun => Ok(DecodedMessage::EndRun(RunEnd {
                run_id: fields.run_id()?,
                end_time: fields.timestamp("timestamp")?,
                message: fields.string("message")?,
                traceback: fields.value("traceback"),
            })),
            MessageKind::Trace(event) => Ok(DecodedMessage::Trace(TraceEvent {
                run_id: fields.run_id()?,
                call_id: fields.call_id()?,
                event,
                func_name: fields.string("func_name")?,
                line_no: fields.unsigned("line_no")?,
                filename,
                trace_arg: fields.value("arg"),
                local_vars: fields.object("local_vars")?,
                timestamp: fields.timestamp("timestamp")?,
            })),
        }
    }
}

/// A message decoded into its typed form
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedMessage {
    /// Opens a run
    StartRun(RunStart),
    /// Closes a run
    EndRun(RunEnd),
    /// Generic trace event
    Trace(TraceEvent),
}

impl DecodedMessage {
    /// The run this message belongs to
    pub fn run_id(&self) -> &RunId {
        match self {
            DecodedMessage::StartRun(start) => &start.run_id,
            DecodedMessage::EndRun(end) => &end.run_id,
            DecodedMessage::Trace(event) => &event.run_id,
        }
    }
}

/// Typed field access over a payload, attributing errors to the message kind
struct Fields<'a> {
    kind: &'a str,
    payload: &'a Map<String, JsonValue>,
}

impl<'a> Fields<'a> {
    fn get(&self, field: &str) -> Option<&'a JsonValue> {
        self.payload.get(field).filter(|value| !value.is_null())
    }

    fn run_id(&self) -> Result<RunId> {
        let value = self
            .get("run_id")
            .ok_or_else(|| Error::missing(self.kind, "run_id"))?;
        RunId::from_json(value)
            .ok_or_else(|| Error::invalid(self.kind, "run_id", "string or integer"))
    }

    fn call_id(&self) -> Result<CallId> {
        let value = self
            .get("call_id")
            .ok_or_else(|| Error::missing(self.kind, "call_id"))?;
        CallId::from_json(value)
            .ok_or_else(|| Error::invalid(self.kind, "call_id", "string or integer"))
    }

    fn string(&self, field: &'static str) -> Result<Option<String>> {
        match self.get(field) {
            None => Ok(None),
            Some(JsonValue::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(Error::invalid(self.kind, field, "string")),
        }
    }

    fn string_list(&self, field: &'static str) -> Result<Vec<String>> {
        let Some(value) = self.get(field) else {
            return Ok(Vec::new());
        };
        let items = value
            .as_array()
            .ok_or_else(|| Error::invalid(self.kind, field, "array of strings"))?;
        items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| Error::invalid(self.kind, field, "array of strings"))
            })
            .collect()
    }

    fn unsigned(&self, field: &'static str) -> Result<Option<u64>> {
        match self.get(field) {
            None => Ok(None),
            Some(value) => value
                .as_u64()
                .map(Some)
                .ok_or_else(|| Error::invalid(self.kind, field, "non-negative integer")),
        }
    }

    fn timestamp(&self, field: &'static str) -> Result<Option<Timestamp>> {
        match self.get(field) {
            None => Ok(None),
            Some(value) => Timestamp::from_json(value)
                .map(Some)
                .ok_or_else(|| Error::invalid(self.kind, field, "non-negative number of seconds")),
        }
    }

    fn object(&self, field: &'static str) -> Result<Option<Map<String, JsonValue>>> {
        match self.get(field) {
            None => Ok(None),
            Some(JsonValue::Object(map)) => Ok(Some(map.clone())),
            Some(_) => Err(Error::invalid(self.kind, field, "object")),
        }
    }

    fn value(&self, field: &str) -> Option<JsonValue> {
        self.get(field).cloned()
    }
}
