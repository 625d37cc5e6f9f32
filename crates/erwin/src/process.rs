//! Handles to live supervised processes.

use tokio::sync::broadcast;
use tracing::info;

/// External handle to a live process.
///
/// Handed out by [`Supervisor::children`]. Killing is the only control
/// operation; a kill surfaces through the ordinary closed transition once
/// both output channels end, never through a separate path.
///
/// [`Supervisor::children`]: crate::Supervisor::children
#[derive(Clone)]
pub struct ProcessHandle {
    name: String,
    pid: Option<u32>,
    stop_tx: broadcast::Sender<()>,
}

impl ProcessHandle {
    pub(crate) fn new(name: String, pid: Option<u32>, stop_tx: broadcast::Sender<()>) -> Self {
        Self { name, pid, stop_tx }
    }

    /// Name the process is tracked under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// OS process id, if the child had not already exited at spawn time.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Request termination.
    ///
    /// Best effort: if the process is already gone there is nobody
    /// listening and the request is dropped.
    pub fn kill(&self) {
        info!(name = %self.name, pid = ?self.pid, "kill requested");
        let _ = self.stop_tx.send(());
    }
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("name", &self.name)
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

/// Live-map record: the handle plus one open flag per output channel.
/// The closed transition happens when the second flag drops.
#[derive(Debug)]
pub(crate) struct LiveProcess {
    pub(crate) stdout_open: bool,
    pub(crate) stderr_open: bool,
    pub(crate) handle: ProcessHandle,
}
