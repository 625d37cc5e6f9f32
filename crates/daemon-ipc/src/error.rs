//! Errors produced by the socket transport.

use thiserror::Error;

/// Transport and protocol failures on the daemon socket.
#[derive(Error, Debug)]
pub enum IpcError {
    #[error("socket I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed protocol message: {0}")]
    Json(#[from] serde_json::Error),

    /// The peer answered, but not with what the protocol promises.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The socket could not be reached at all.
    #[error("socket unavailable: {0}")]
    Socket(String),

    /// The peer went away mid-exchange.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type IpcResult<T> = Result<T, IpcError>;
