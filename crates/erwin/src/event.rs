//! Output records produced by supervised processes.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Which output channel of a process a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::Stdout => write!(f, "stdout"),
            StreamKind::Stderr => write!(f, "stderr"),
        }
    }
}

/// One framed, tagged line of output on the merged event bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessEvent {
    /// Name the producing process is tracked under.
    pub name: String,
    /// Command the process was launched from.
    pub command: String,
    /// One logical line, delimiter stripped.
    pub message: String,
    /// Channel the line arrived on.
    pub stream: StreamKind,
    /// Millisecond epoch timestamp taken when the line was framed.
    pub time: i64,
}

impl ProcessEvent {
    /// Build an event stamped with the current time.
    pub fn new(
        name: impl Into<String>,
        command: impl Into<String>,
        message: impl Into<String>,
        stream: StreamKind,
    ) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            message: message.into(),
            stream,
            time: Utc::now().timestamp_millis(),
        }
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// One unframed read from a process channel, published on the raw bus
/// before any line splitting happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    /// Name the producing process is tracked under.
    pub name: String,
    /// Channel the bytes arrived on.
    pub stream: StreamKind,
    /// The bytes exactly as read from the pipe.
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&StreamKind::Stdout).unwrap(), "\"stdout\"");
        assert_eq!(serde_json::to_string(&StreamKind::Stderr).unwrap(), "\"stderr\"");
    }

    #[test]
    fn event_carries_all_wire_fields() {
        let event = ProcessEvent::new("web", "node", "listening on 3000", StreamKind::Stdout);
        let json = event.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["name"], "web");
        assert_eq!(value["command"], "node");
        assert_eq!(value["message"], "listening on 3000");
        assert_eq!(value["stream"], "stdout");
        assert!(value["time"].as_i64().unwrap() > 0);
    }

    #[test]
    fn event_round_trips_through_json() {
        let event = ProcessEvent::new("web", "node", "boom", StreamKind::Stderr);
        let back = ProcessEvent::from_json(&event.to_json().unwrap()).unwrap();
        assert_eq!(back, event);
    }
}
