//! Incremental frame parser
//!
//! Frames are newline-terminated lines. Only lines starting with
//! [`DATA_PREFIX`] carry a payload; everything else (comments, `event:`
//! lines, keep-alive blank lines) is ignored. Fragments may split a line
//! anywhere, including inside a multi-byte UTF-8 sequence, so bytes are
//! buffered until the terminator arrives.

use super::{SessionId, StreamEvent};
use serde_json::Value;

pub const DATA_PREFIX: &str = "data:";
pub const DONE_SENTINEL: &str = "[DONE]";

/// Turns raw response fragments into [`StreamEvent`]s
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known to contain no newline
    scanned: usize,
    finished: bool,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next fragment, returning every event completed by it.
    ///
    /// After the sentinel has been seen the parser is finished and ignores
    /// all further input, including the rest of the fragment that held it.
    pub fn feed(&mut self, fragment: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }
        self.buffer.extend_from_slice(fragment);

        while let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
            let end = self.scanned + offset;
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            self.scanned = 0;

            if let Some(event) = self.parse_line(&line) {
                events.push(event);
            }
            if self.finished {
                self.buffer.clear();
                return events;
            }
        }

        self.scanned = self.buffer.len();
        events
    }

    /// Flush a final unterminated line once the connection has closed cleanly
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.finished || self.buffer.is_empty() {
            self.buffer.clear();
            self.scanned = 0;
            return Vec::new();
        }
        let line = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        self.parse_line(&line).into_iter().collect()
    }

    /// Whether the end-of-stream sentinel has been seen
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Bytes held back waiting for a line terminator
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    fn parse_line(&mut self, raw: &[u8]) -> Option<StreamEvent> {
        let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);

        let Ok(line) = std::str::from_utf8(raw) else {
            tracing::debug!(len = raw.len(), "Skipping frame with invalid UTF-8");
            return None;
        };
        let payload = line.strip_prefix(DATA_PREFIX)?;
        let payload = payload.strip_prefix(' ').unwrap_or(payload);

        if payload.trim() == DONE_SENTINEL {
            self.finished = true;
            return None;
        }

        match serde_json::from_str::<Value>(payload) {
            Ok(value) => decode_payload(&value),
            Err(e) => {
                tracing::debug!(error = %e, payload, "Skipping malformed frame");
                None
            }
        }
    }
}

/// Map a JSON payload to an event; `None` for anything unrecognised
fn decode_payload(value: &Value) -> Option<StreamEvent> {
    let object = value.as_object()?;

    if let Some(error) = object.get("error").filter(|e| !is_blank(e)) {
        return Some(StreamEvent::Error {
            message: error_message(error),
        });
    }

    let kind = object.get("type").and_then(Value::as_str)?;
    let text = |field: &str| object.get(field).and_then(Value::as_str).map(str::to_string);

    match kind {
        "token" => text("content").map(|content| StreamEvent::Token { content }),
        "source" => text("source").map(|label| StreamEvent::Source { label }),
        "session" => text("session_id")
            .filter(|id| !id.is_empty())
            .map(|id| StreamEvent::SessionAssigned {
                id: SessionId::new(id),
            }),
        "done" => Some(StreamEvent::Done {
            source: text("source"),
        }),
        other => {
            tracing::trace!(kind = other, "Ignoring unknown frame type");
            None
        }
    }
}

/// `null` or `""` in the `error` field means no error
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn error_message(error: &Value) -> String {
    if let Some(message) = error.as_str() {
        return message.to_string();
    }
    if let Some(message) = error.get("message").and_then(Value::as_str) {
        return message.to_string();
    }
    "The assistant reported an error while streaming".to_string()
}
