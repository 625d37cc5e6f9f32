//! Pure IPC protocol types shared by the Erwin daemon and its clients.
//!
//! A JSON-RPC-like protocol over Unix domain sockets: one JSON document
//! per line in both directions. This crate is types only; the transport
//! lives in `daemon-ipc`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Methods understood by the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    // Daemon
    Health,
    Shutdown,

    // Processes
    #[serde(rename = "process.list")]
    ProcessList,
    #[serde(rename = "process.start")]
    ProcessStart,
    #[serde(rename = "process.stop")]
    ProcessStop,
    #[serde(rename = "process.restart")]
    ProcessRestart,

    // Subscriptions (streaming)
    #[serde(rename = "log.subscribe")]
    LogSubscribe,
    #[serde(rename = "log.unsubscribe")]
    LogUnsubscribe,
    #[serde(rename = "raw.subscribe")]
    RawSubscribe,
    #[serde(rename = "raw.unsubscribe")]
    RawUnsubscribe,
}

/// Output channel of a supervised process, as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl std::fmt::Display for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputStream::Stdout => write!(f, "stdout"),
            OutputStream::Stderr => write!(f, "stderr"),
        }
    }
}

/// One framed output line, pushed to `log.subscribe` subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOutputRecord {
    /// Process name.
    pub name: String,
    /// Command the process was launched from.
    pub command: String,
    /// One logical line of output.
    pub message: String,
    /// Channel the line arrived on.
    pub stream: OutputStream,
    /// Millisecond epoch timestamp.
    pub time: i64,
}

impl ProcessOutputRecord {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// One unframed output chunk, pushed to `raw.subscribe` subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOutputRecord {
    /// Process name.
    pub name: String,
    /// Channel the bytes arrived on.
    pub stream: OutputStream,
    /// Chunk bytes, base64-encoded.
    pub data: String,
}

impl RawOutputRecord {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// One call from a client, one JSON document on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id echoed back in the response.
    pub id: String,
    /// Method to invoke.
    pub method: Method,
    /// Method-specific parameters, shape fixed per method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Request {
    /// Parameterless request with a fresh correlation id.
    pub fn new(method: Method) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            method,
            params: None,
        }
    }

    /// Request carrying parameters, with a fresh correlation id.
    pub fn with_params(method: Method, params: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            method,
            params: Some(params),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// The daemon's answer to one [`Request`].
///
/// Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Correlation id of the request this answers.
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

/// Failure detail inside an error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// One of the [`error_codes`] values.
    pub code: i32,
    /// Human-readable description.
    pub message: String,
    /// Extra structured context, when the method has any to give.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Response {
    pub fn success(id: &str, result: serde_json::Value) -> Self {
        Self {
            id: id.to_string(),
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: &str, code: i32, message: &str) -> Self {
        Self::error_inner(id, code, message, None)
    }

    pub fn error_with_data(id: &str, code: i32, message: &str, data: serde_json::Value) -> Self {
        Self::error_inner(id, code, message, Some(data))
    }

    fn error_inner(id: &str, code: i32, message: &str, data: Option<serde_json::Value>) -> Self {
        Self {
            id: id.to_string(),
            result: None,
            error: Some(ErrorInfo {
                code,
                message: message.to_string(),
                data,
            }),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Error codes: the JSON-RPC standard set plus daemon-specific codes.
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    /// Named process or config does not exist.
    pub const NOT_FOUND: i32 = -32002;
    /// A live process already holds the requested name.
    pub const CONFLICT: i32 = -32003;
    /// A killed process did not close within the stop deadline.
    pub const KILL_TIMEOUT: i32 = -32004;
}
