//! JSON-lines message transport
//!
//! Each non-blank line holds one message as a two-element JSON array:
//!
//! ```text
//! ["start_run", {"run_id": "r1", "cwd": "/tmp/proj", "command_line": ["python", "app.py"]}]
//! ["call", {"run_id": "r1", "call_id": "c1", "filename": "app.py", "line_no": 1}]
//! ["end_run", {"run_id": "r1", "message": "ok"}]
//! ```

use serde_json::Value as JsonValue;
use std::io::{BufRead, Lines};
use tracerec_core::{Error, Message, Result};

/// Iterator of messages read from a line-oriented reader
#[derive(Debug)]
pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    line_number: usize,
    failed: bool,
}

impl<R: BufRead> JsonLinesSource<R> {
    /// Read messages from `reader`
    pub fn new(reader: R) -> Self {
        JsonLinesSource {
            lines: reader.lines(),
            line_number: 0,
            failed: false,
        }
    }

    /// 1-based number of the last line read
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

impl<R: BufRead> Iterator for JsonLinesSource<R> {
    type Item = Result<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(Error::Transport(e)));
                }
            };
            self.line_number += 1;
            if line.trim().is_empty() {
                continue;
            }
            return Some(parse_line(self.line_number, &line));
        }
    }
}

fn parse_line(line_number: usize, line: &str) -> Result<Message> {
    let malformed = |detail: String| Error::MalformedMessage {
        line: line_number,
        detail,
    };

    let value: JsonValue = serde_json::from_str(line).map_err(|e| malformed(e.to_string()))?;
    let JsonValue::Array(mut parts) = value else {
        return Err(malformed("expected a [kind, payload] array".to_string()));
    };
    if parts.len() != 2 {
        return Err(malformed(format!(
            "expected 2 elements, found {}",
            parts.len()
        )));
    }

    let payload = parts.pop().unwrap_or(JsonValue::Null);
    let kind = match parts.pop() {
        Some(JsonValue::String(kind)) => kind,
        _ => return Err(malformed("message kind must be a string".to_string())),
    };
    Message::from_value(kind, payload)
        .ok_or_else(|| malformed("message payload must be an object".to_string()))
}
