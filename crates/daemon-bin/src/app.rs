//! Daemon assembly: the supervisor, the IPC server, and the bridges
//! between them.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use daemon_ipc::{
    IpcServer, OutputStream, ProcessOutputRecord, RawOutputRecord, LOG_TOPIC, RAW_TOPIC,
};
use erwin::{StreamKind, Supervisor};
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::config::parse_command_line;
use crate::ipc::register::register_handlers;
use crate::Args;

/// Run the daemon until shutdown.
///
/// Shutdown comes from the IPC `shutdown` method, or, unless
/// `--keep-alive` is set, from the supervised process set draining to
/// empty.
pub async fn run_daemon(args: &Args, socket_path: &Path) -> anyhow::Result<()> {
    let supervisor = Supervisor::new();

    for line in &args.command {
        match parse_command_line(line) {
            Some(config) => supervisor.add_process(config).await,
            None => warn!(line = %line, "Ignoring blank --command value"),
        }
    }

    let socket = socket_path
        .to_str()
        .context("socket path is not valid UTF-8")?;
    let server = Arc::new(IpcServer::new(socket));
    register_handlers(&server, supervisor.clone()).await;

    spawn_stdout_printer(&supervisor);
    spawn_log_forwarder(&supervisor, server.clone());
    spawn_raw_forwarder(&supervisor, server.clone());

    // Subscribe before launching anything so an instant drain is not missed.
    let mut all_closed = supervisor.subscribe_all_closed();
    supervisor.run_configured_processes().await;

    let run_fut = server.run();
    tokio::pin!(run_fut);

    if args.keep_alive {
        run_fut.await?;
    } else {
        // Biased so the server future is polled (and its shutdown receiver
        // exists) before a drain can trigger shutdown.
        tokio::select! {
            biased;
            result = &mut run_fut => {
                result?;
            }
            _ = all_closed.recv() => {
                info!("All processes closed, server stopping");
                server.shutdown();
                run_fut.await?;
            }
        }
    }

    info!("Server exiting gracefully");
    Ok(())
}

/// Mirror the merged event bus to stdout, one JSON event per line.
fn spawn_stdout_printer(supervisor: &Supervisor) {
    let mut events = supervisor.subscribe_events();
    tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        loop {
            match events.recv().await {
                Ok(event) => {
                    let json = match event.to_json() {
                        Ok(json) => json,
                        Err(e) => {
                            warn!(error = %e, "Failed to serialize event");
                            continue;
                        }
                    };
                    if stdout.write_all(json.as_bytes()).await.is_err() {
                        break;
                    }
                    if stdout.write_all(b"\n").await.is_err() {
                        break;
                    }
                    if stdout.flush().await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    warn!(skipped = n, "Stdout printer lagged, skipped events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// Forward merged events to the `log` subscription topic.
fn spawn_log_forwarder(supervisor: &Supervisor, server: Arc<IpcServer>) {
    let mut events = supervisor.subscribe_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let record = ProcessOutputRecord {
                        name: event.name,
                        command: event.command,
                        message: event.message,
                        stream: wire_stream(event.stream),
                        time: event.time,
                    };
                    match record.to_json() {
                        Ok(line) => {
                            server
                                .subscriptions()
                                .broadcast_or_create(LOG_TOPIC, line)
                                .await;
                        }
                        Err(e) => warn!(error = %e, "Failed to serialize output record"),
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    warn!(skipped = n, "Log forwarder lagged, skipped events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// Forward raw chunks to the `raw` subscription topic.
///
/// Chunks are only encoded while the topic has subscribers.
fn spawn_raw_forwarder(supervisor: &Supervisor, server: Arc<IpcServer>) {
    let mut chunks = supervisor.subscribe_raw();
    tokio::spawn(async move {
        loop {
            match chunks.recv().await {
                Ok(chunk) => {
                    if server.subscriptions().subscriber_count(RAW_TOPIC).await == 0 {
                        continue;
                    }
                    let record = RawOutputRecord {
                        name: chunk.name,
                        stream: wire_stream(chunk.stream),
                        data: BASE64.encode(&chunk.bytes),
                    };
                    match record.to_json() {
                        Ok(line) => {
                            server.subscriptions().broadcast(RAW_TOPIC, line).await;
                        }
                        Err(e) => warn!(error = %e, "Failed to serialize raw record"),
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    warn!(skipped = n, "Raw forwarder lagged, skipped chunks");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

fn wire_stream(stream: StreamKind) -> OutputStream {
    match stream {
        StreamKind::Stdout => OutputStream::Stdout,
        StreamKind::Stderr => OutputStream::Stderr,
    }
}
