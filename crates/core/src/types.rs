//! Identity types for recorded data
//!
//! This module defines the caller-supplied identifiers:
//! - RunId: identifies one execution of an instrumented program
//! - CallId: groups the trace events of one function invocation
//!
//! Both are opaque to the recorder. Tracers may send them as JSON strings or
//! integers; integers are kept in their decimal text form so that `1` and
//! `"1"` name the same run.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Identifier of a recorded run
///
/// Assigned by the tracer, never generated by the recorder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Create a RunId from its text form
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Interpret a JSON payload value as a RunId
    ///
    /// Returns None unless the value is a string or an integer.
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        id_text(value).map(Self)
    }

    /// Get the text form of this RunId
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<u64> for RunId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

/// Identifier of a function invocation within a run
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(String);

impl CallId {
    /// Create a CallId from its text form
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Interpret a JSON payload value as a CallId
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        id_text(value).map(Self)
    }

    /// Get the text form of this CallId
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<u64> for CallId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

fn id_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_run_id_from_string_and_integer_agree() {
        let a = RunId::from_json(&json!("1")).unwrap();
        let b = RunId::from_json(&json!(1)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, RunId::from(1u64));
    }

    #[test]
    fn test_run_id_rejects_non_scalar() {
        assert!(RunId::from_json(&json!(null)).is_none());
        assert!(RunId::from_json(&json!(1.5)).is_none());
        assert!(RunId::from_json(&json!({"id": 1})).is_none());
        assert!(RunId::from_json(&json!([1])).is_none());
    }

    #[test]
    fn test_call_id_negative_integer() {
        let id = CallId::from_json(&json!(-7)).unwrap();
        assert_eq!(id.as_str(), "-7");
    }

    #[test]
    fn test_display() {
        assert_eq!(RunId::new("abc").to_string(), "abc");
        assert_eq!(CallId::from(10u64).to_string(), "10");
    }

    #[test]
    fn test_serde_is_transparent() {
        let json = serde_json::to_string(&RunId::new("run-1")).unwrap();
        assert_eq!(json, "\"run-1\"");
        let back: RunId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_str(), "run-1");
    }

    proptest::proptest! {
        #[test]
        fn prop_integer_and_text_ids_agree(n in proptest::prelude::any::<i64>()) {
            let from_int = RunId::from_json(&json!(n)).unwrap();
            let from_text = RunId::from_json(&json!(n.to_string())).unwrap();
            proptest::prop_assert_eq!(from_int, from_text);
        }
    }
}
