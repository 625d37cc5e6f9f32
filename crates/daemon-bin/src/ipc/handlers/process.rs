//! Process control handlers.

use std::time::Duration;

use daemon_ipc::{error_codes, IpcServer, Method, Response};
use erwin::{ErwinError, RunOptions, Supervisor};
use tokio::time::timeout;

/// How long `process.stop` waits for a killed process to close before
/// reporting failure.
const KILL_PROCESS_TIMEOUT_MS: u64 = 3000;

/// Register process control handlers.
pub async fn register(server: &IpcServer, supervisor: Supervisor) {
    register_process_list(server, supervisor.clone()).await;
    register_process_start(server, supervisor.clone()).await;
    register_process_stop(server, supervisor.clone()).await;
    register_process_restart(server, supervisor).await;
}

async fn register_process_list(server: &IpcServer, supervisor: Supervisor) {
    server
        .register_handler(Method::ProcessList, move |req| {
            let supervisor = supervisor.clone();
            async move {
                let children = supervisor.children().await;
                let configs = supervisor.configs().await;

                // Definitions keyed by the names that are currently live.
                let mut processes = serde_json::Map::new();
                for name in children.keys() {
                    if let Some(config) = configs.get(name) {
                        match serde_json::to_value(config) {
                            Ok(value) => {
                                processes.insert(name.clone(), value);
                            }
                            Err(e) => {
                                return Response::error(
                                    &req.id,
                                    error_codes::INTERNAL_ERROR,
                                    &format!("Failed to serialize config: {}", e),
                                );
                            }
                        }
                    }
                }

                Response::success(&req.id, serde_json::json!({ "processes": processes }))
            }
        })
        .await;
}

async fn register_process_start(server: &IpcServer, supervisor: Supervisor) {
    server
        .register_handler(Method::ProcessStart, move |req| {
            let supervisor = supervisor.clone();
            async move {
                let command = req
                    .params
                    .as_ref()
                    .and_then(|p| p.get("command"))
                    .and_then(|v| v.as_str())
                    .map(String::from);

                let Some(command) = command else {
                    return Response::error(
                        &req.id,
                        error_codes::INVALID_PARAMS,
                        "command is required",
                    );
                };

                let name = req
                    .params
                    .as_ref()
                    .and_then(|p| p.get("name"))
                    .and_then(|v| v.as_str())
                    .map(String::from)
                    .unwrap_or_else(|| command.clone());

                let args: Vec<String> = req
                    .params
                    .as_ref()
                    .and_then(|p| p.get("args"))
                    .and_then(|v| v.as_array())
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|v| v.as_str().map(String::from))
                            .collect()
                    })
                    .unwrap_or_default();

                start_process(&req.id, &supervisor, &name, &command, args).await
            }
        })
        .await;
}

async fn register_process_stop(server: &IpcServer, supervisor: Supervisor) {
    server
        .register_handler(Method::ProcessStop, move |req| {
            let supervisor = supervisor.clone();
            async move {
                let name = req
                    .params
                    .as_ref()
                    .and_then(|p| p.get("name"))
                    .and_then(|v| v.as_str())
                    .map(String::from);

                let Some(name) = name else {
                    return Response::error(
                        &req.id,
                        error_codes::INVALID_PARAMS,
                        "name is required",
                    );
                };

                let children = supervisor.children().await;
                let Some(handle) = children.get(&name) else {
                    return Response::error(
                        &req.id,
                        error_codes::NOT_FOUND,
                        &ErwinError::UnknownName(name.clone()).to_string(),
                    );
                };

                // Subscribe before killing so the close cannot be missed.
                let mut closed = supervisor.subscribe_process_closed(&name).await;
                handle.kill();

                match timeout(Duration::from_millis(KILL_PROCESS_TIMEOUT_MS), closed.recv()).await
                {
                    Ok(_) => Response::success(
                        &req.id,
                        serde_json::json!({
                            "stopped": true,
                            "message": format!("Process `{}` stopped", name),
                        }),
                    ),
                    Err(_) => Response::error(
                        &req.id,
                        error_codes::KILL_TIMEOUT,
                        "Process failed to close.",
                    ),
                }
            }
        })
        .await;
}

async fn register_process_restart(server: &IpcServer, supervisor: Supervisor) {
    server
        .register_handler(Method::ProcessRestart, move |req| {
            let supervisor = supervisor.clone();
            async move {
                let name = req
                    .params
                    .as_ref()
                    .and_then(|p| p.get("name"))
                    .and_then(|v| v.as_str())
                    .map(String::from);

                let Some(name) = name else {
                    return Response::error(
                        &req.id,
                        error_codes::INVALID_PARAMS,
                        "name is required",
                    );
                };

                let Some(config) = supervisor.get_config(&name).await else {
                    return Response::error(
                        &req.id,
                        error_codes::NOT_FOUND,
                        &ErwinError::UnknownName(name).to_string(),
                    );
                };

                start_process(
                    &req.id,
                    &supervisor,
                    &config.name,
                    &config.command,
                    config.args.clone(),
                )
                .await
            }
        })
        .await;
}

/// Launch a process and translate the outcome into a response.
async fn start_process(
    request_id: &str,
    supervisor: &Supervisor,
    name: &str,
    command: &str,
    args: Vec<String>,
) -> Response {
    match supervisor
        .run_command(name, command, args, RunOptions::new(), None)
        .await
    {
        Ok(()) => Response::success(
            request_id,
            serde_json::json!({
                "started": true,
                "message": format!("Process `{}` started", name),
            }),
        ),
        Err(ErwinError::DuplicateName(name)) => Response::error(
            request_id,
            error_codes::CONFLICT,
            &format!("Process `{}` is already running", name),
        ),
        Err(e) => Response::error(request_id, error_codes::INTERNAL_ERROR, &e.to_string()),
    }
}
