//! Handler registration for the IPC server.

use daemon_ipc::IpcServer;
use erwin::Supervisor;
use tracing::info;

use crate::ipc::handlers;

/// Register all IPC handlers.
pub async fn register_handlers(server: &IpcServer, supervisor: Supervisor) {
    handlers::health::register(server).await;
    handlers::process::register(server, supervisor).await;

    info!("All IPC handlers registered");
}
