//! Error types for the supervision engine.

use std::process::ExitStatus;

use thiserror::Error;

/// Errors produced while launching and supervising processes.
#[derive(Debug, Error)]
pub enum ErwinError {
    /// The OS refused to spawn the command. Delivered through the
    /// completion hook so callers have a single failure surface.
    #[error("failed to spawn `{command}` for process `{name}`: {source}")]
    Spawn {
        name: String,
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The process ran but exited with a failure status.
    #[error("command `{command}` (process `{name}`) exited with {status}")]
    NonZeroExit {
        name: String,
        command: String,
        status: ExitStatus,
    },

    /// Waiting for the exit status failed.
    #[error("failed to wait for `{command}` (process `{name}`): {source}")]
    Wait {
        name: String,
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// A live process already holds this name.
    #[error("process `{0}` is already running")]
    DuplicateName(String),

    /// No process is registered under this name.
    #[error("unknown process `{0}`")]
    UnknownName(String),
}

/// Result type for supervision operations.
pub type ErwinResult<T> = Result<T, ErwinError>;
