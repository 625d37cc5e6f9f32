//! Erwin daemon entry point.
//!
//! Supervises the processes given with `--command`, mirrors their merged
//! output to stdout as NDJSON, and serves control and subscription
//! requests on a Unix socket.

mod app;
mod config;
mod ipc;
mod logging;

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

/// Erwin: process supervision daemon with a multiplexed output feed.
#[derive(Parser, Debug)]
#[command(name = "erwin-daemon")]
#[command(about = "Process supervision daemon with a multiplexed output feed")]
#[command(version)]
struct Args {
    /// Process to launch at startup, given as a full command line.
    /// May be repeated; the first word names the process.
    #[arg(short = 'c', long = "command")]
    command: Vec<String>,

    /// Path to the daemon socket.
    #[arg(long, env = "ERWIN_SOCKET")]
    socket: Option<PathBuf>,

    /// Keep serving after every supervised process has closed.
    #[arg(long)]
    keep_alive: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logging::init_logging(&args.log_level);

    info!("Erwin daemon starting...");

    let socket_path = args
        .socket
        .clone()
        .unwrap_or_else(config::default_socket_path);

    info!(
        socket = %socket_path.display(),
        keep_alive = args.keep_alive,
        commands = args.command.len(),
        "Configuration loaded"
    );

    // Install signal handler for graceful shutdown
    let ctrl_c = tokio::signal::ctrl_c();

    tokio::select! {
        result = app::run_daemon(&args, &socket_path) => {
            if let Err(e) = result {
                error!(error = %e, "Daemon exited with error");
                return Err(e);
            }
        }
        _ = ctrl_c => {
            info!("Received shutdown signal, exiting...");
        }
    }

    info!("Server successfully shutdown");
    Ok(())
}
