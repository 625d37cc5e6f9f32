//! The supervisor: config registry, launcher, live map, and output buses.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use tokio::process::{Child, Command};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::channel::pump_channel;
use crate::config::ProcessConfig;
use crate::error::{ErwinError, ErwinResult};
use crate::event::{ProcessEvent, RawChunk, StreamKind};
use crate::lifecycle::LifecycleHub;
use crate::process::{LiveProcess, ProcessHandle};

/// Capacity of the merged event bus and the raw bus. Slow subscribers lag
/// past this point; the pumps never block on them.
const OUTPUT_BUS_CAPACITY: usize = 1024;
/// Capacity of a per-process stop channel. One pending kill is plenty.
const STOP_CAPACITY: usize = 1;

/// Completion hook invoked exactly once per launched process, after its
/// exit status and both channel ends have been observed. `None` means a
/// clean exit.
pub type CompletionHook = Box<dyn FnOnce(Option<ErwinError>) + Send + 'static>;

/// Spawn options for [`Supervisor::run_command`].
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    cwd: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Working directory for the child.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Add one environment variable for the child.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// A process supervisor.
///
/// Owns a config registry, a live-process map, the merged event bus, the
/// raw bus, and a [`LifecycleHub`]. Everything is instance state: two
/// supervisors in one program never share anything. Cloning is cheap and
/// clones operate on the same instance.
#[derive(Clone, Default)]
pub struct Supervisor {
    inner: Arc<SupervisorInner>,
}

pub(crate) struct SupervisorInner {
    /// Named definitions; independent of the live map.
    configs: RwLock<HashMap<String, ProcessConfig>>,
    /// Live processes; at most one entry per name. Lock order is `live`
    /// before `configs` when both are held.
    live: RwLock<HashMap<String, LiveProcess>>,
    pub(crate) events_tx: broadcast::Sender<ProcessEvent>,
    pub(crate) raw_tx: broadcast::Sender<RawChunk>,
    lifecycle: LifecycleHub,
}

impl Default for SupervisorInner {
    fn default() -> Self {
        let (events_tx, _) = broadcast::channel(OUTPUT_BUS_CAPACITY);
        let (raw_tx, _) = broadcast::channel(OUTPUT_BUS_CAPACITY);
        Self {
            configs: RwLock::new(HashMap::new()),
            live: RwLock::new(HashMap::new()),
            events_tx,
            raw_tx,
            lifecycle: LifecycleHub::new(),
        }
    }
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition, replacing any existing one with the same name.
    ///
    /// Never touches a running process; the new definition applies from the
    /// next start.
    pub async fn add_process(&self, config: ProcessConfig) {
        debug!(name = %config.name, command = %config.command, "registering process config");
        let mut configs = self.inner.configs.write().await;
        configs.insert(config.name.clone(), config);
    }

    /// Look up one definition by name.
    pub async fn get_config(&self, name: &str) -> Option<ProcessConfig> {
        self.inner.configs.read().await.get(name).cloned()
    }

    /// Snapshot of every registered definition, keyed by name.
    pub async fn configs(&self) -> HashMap<String, ProcessConfig> {
        self.inner.configs.read().await.clone()
    }

    /// Snapshot of the live map: name to handle.
    ///
    /// A process launched by [`run_command`](Self::run_command) is visible
    /// here before that call returns, and gone once it closes.
    pub async fn children(&self) -> HashMap<String, ProcessHandle> {
        self.inner
            .live
            .read()
            .await
            .iter()
            .map(|(name, live)| (name.clone(), live.handle.clone()))
            .collect()
    }

    /// Launch every definition whose auto-start flag is set.
    ///
    /// One failed launch never stops the sweep; failures are logged and
    /// the rest proceed.
    pub async fn run_configured_processes(&self) {
        let marked: Vec<ProcessConfig> = self
            .inner
            .configs
            .read()
            .await
            .values()
            .filter(|config| config.auto_start)
            .cloned()
            .collect();
        info!(count = marked.len(), "starting auto-start processes");
        for config in marked {
            if let Err(e) = self
                .run_command(
                    &config.name,
                    &config.command,
                    config.args.clone(),
                    RunOptions::new(),
                    None,
                )
                .await
            {
                warn!(name = %config.name, error = %e, "auto-start launch skipped");
            }
        }
    }

    /// Launch a named process.
    ///
    /// Registers (or re-registers) a definition under `name`, spawns the
    /// command with stdout and stderr piped, and starts pumping both
    /// channels onto the buses.
    ///
    /// A name that is already live is rejected with
    /// [`ErwinError::DuplicateName`] before any side effect. A spawn
    /// failure is not an `Err`: it is reported through `on_complete`, the
    /// single completion surface, which is invoked exactly once per launch
    /// with `None` after a clean exit and the error otherwise.
    pub async fn run_command(
        &self,
        name: &str,
        command: &str,
        args: Vec<String>,
        options: RunOptions,
        on_complete: Option<CompletionHook>,
    ) -> ErwinResult<()> {
        // Held across the spawn so two launches with the same name cannot
        // interleave between the duplicate check and the insert.
        let mut live = self.inner.live.write().await;
        if live.contains_key(name) {
            return Err(ErwinError::DuplicateName(name.to_string()));
        }

        {
            // Re-register so a later restart can reuse the definition. An
            // existing entry keeps its auto-start flag.
            let mut configs = self.inner.configs.write().await;
            let auto_start = configs.get(name).map(|c| c.auto_start).unwrap_or(true);
            configs.insert(
                name.to_string(),
                ProcessConfig::new(name, command)
                    .with_args(args.iter().cloned())
                    .with_auto_start(auto_start),
            );
        }

        let mut cmd = Command::new(command);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &options.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &options.env {
            cmd.env(key, value);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                drop(live);
                let err = ErwinError::Spawn {
                    name: name.to_string(),
                    command: command.to_string(),
                    source: e,
                };
                warn!(name = %name, command = %command, error = %err, "spawn failed");
                if let Some(done) = on_complete {
                    done(Some(err));
                }
                return Ok(());
            }
        };

        let pid = child.id();
        let (stop_tx, stop_rx) = broadcast::channel(STOP_CAPACITY);
        let handle = ProcessHandle::new(name.to_string(), pid, stop_tx);
        live.insert(
            name.to_string(),
            LiveProcess {
                stdout_open: true,
                stderr_open: true,
                handle,
            },
        );
        drop(live);

        info!(name = %name, command = %command, pid = ?pid, "process spawned");
        tokio::spawn(supervise(
            self.inner.clone(),
            name.to_string(),
            command.to_string(),
            child,
            stop_rx,
            on_complete,
        ));
        Ok(())
    }

    /// Subscribe to the merged event bus.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ProcessEvent> {
        self.inner.events_tx.subscribe()
    }

    /// Subscribe to the raw, unframed output bus.
    pub fn subscribe_raw(&self) -> broadcast::Receiver<RawChunk> {
        self.inner.raw_tx.subscribe()
    }

    /// Subscribe to the closed topic for one name.
    /// See [`LifecycleHub::subscribe_process_closed`].
    pub async fn subscribe_process_closed(&self, name: &str) -> broadcast::Receiver<()> {
        self.inner.lifecycle.subscribe_process_closed(name).await
    }

    /// Subscribe to every closed notification; items carry the name.
    pub fn subscribe_closed(&self) -> broadcast::Receiver<String> {
        self.inner.lifecycle.subscribe_closed()
    }

    /// Subscribe to the all-processes-closed signal.
    pub fn subscribe_all_closed(&self) -> broadcast::Receiver<()> {
        self.inner.lifecycle.subscribe_all_closed()
    }
}

impl SupervisorInner {
    /// Record that one channel of `name` ended. The call that drops the
    /// second flag removes the live entry and fires the closed
    /// notifications; if that drained the map, the all-closed signal fires
    /// as well.
    pub(crate) async fn channel_closed(&self, name: &str, stream: StreamKind) {
        let now_empty = {
            let mut live = self.live.write().await;
            let entry = match live.get_mut(name) {
                Some(entry) => entry,
                None => return,
            };
            match stream {
                StreamKind::Stdout => entry.stdout_open = false,
                StreamKind::Stderr => entry.stderr_open = false,
            }
            if entry.stdout_open || entry.stderr_open {
                return;
            }
            live.remove(name);
            live.is_empty()
        };

        debug!(name = %name, "both channels ended, process closed");
        self.lifecycle.notify_closed(name).await;
        if now_empty {
            info!("last live process closed");
            self.lifecycle.notify_all_closed();
        }
    }
}

/// Drive one child to completion: honor kill requests, wait for the exit
/// status, then wait for both pumps so completion is reported only after
/// stdout end, stderr end, and the exit have all been observed.
async fn supervise(
    inner: Arc<SupervisorInner>,
    name: String,
    command: String,
    mut child: Child,
    mut stop_rx: broadcast::Receiver<()>,
    on_complete: Option<CompletionHook>,
) {
    let stdout_task = if let Some(stdout) = child.stdout.take() {
        Some(tokio::spawn(pump_channel(
            stdout,
            name.clone(),
            command.clone(),
            StreamKind::Stdout,
            inner.clone(),
        )))
    } else {
        // A missing pipe counts as an already-ended channel.
        inner.channel_closed(&name, StreamKind::Stdout).await;
        None
    };
    let stderr_task = if let Some(stderr) = child.stderr.take() {
        Some(tokio::spawn(pump_channel(
            stderr,
            name.clone(),
            command.clone(),
            StreamKind::Stderr,
            inner.clone(),
        )))
    } else {
        inner.channel_closed(&name, StreamKind::Stderr).await;
        None
    };

    let status = loop {
        tokio::select! {
            res = child.wait() => break res,
            sig = stop_rx.recv() => match sig {
                Ok(()) | Err(RecvError::Lagged(_)) => {
                    info!(name = %name, "kill requested, signalling child");
                    if let Err(e) = child.start_kill() {
                        warn!(name = %name, error = %e, "failed to signal child");
                    }
                }
                Err(RecvError::Closed) => break child.wait().await,
            },
        }
    };

    // The pipes keep draining after the exit; the closed transition and
    // the completion report both wait for the channel ends.
    if let Some(task) = stdout_task {
        let _ = task.await;
    }
    if let Some(task) = stderr_task {
        let _ = task.await;
    }

    let completion = match status {
        Ok(status) if status.success() => {
            info!(name = %name, "process exited cleanly");
            None
        }
        Ok(status) => {
            warn!(name = %name, command = %command, status = %status, "process exited with failure");
            Some(ErwinError::NonZeroExit {
                name: name.clone(),
                command: command.clone(),
                status,
            })
        }
        Err(e) => {
            error!(name = %name, error = %e, "failed to wait for process");
            Some(ErwinError::Wait {
                name: name.clone(),
                command: command.clone(),
                source: e,
            })
        }
    };

    if let Some(done) = on_complete {
        done(completion);
    }
}
