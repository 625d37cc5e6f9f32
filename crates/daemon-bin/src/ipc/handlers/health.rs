//! Daemon health and shutdown methods.

use daemon_ipc::{IpcServer, Method, Response};
use tracing::info;

/// Register the `health` and `shutdown` methods.
pub async fn register(server: &IpcServer) {
    server
        .register_handler(Method::Health, |req| async move {
            // Identifies the daemon to clients probing the socket.
            Response::success(
                &req.id,
                serde_json::json!({
                    "status": "ok",
                    "name": "erwin",
                    "version": env!("CARGO_PKG_VERSION"),
                }),
            )
        })
        .await;

    let shutdown_tx = server.shutdown_sender();
    server
        .register_handler(Method::Shutdown, move |req| {
            let tx = shutdown_tx.clone();
            async move {
                let _ = tx.send(());
                Response::success(&req.id, serde_json::json!({ "status": "shutting_down" }))
            }
        })
        .await;

    info!("registered health handlers");
}
