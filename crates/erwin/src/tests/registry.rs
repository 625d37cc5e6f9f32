//! Config registration and the auto-start sweep.

use crate::config::ProcessConfig;
use crate::supervisor::{RunOptions, Supervisor};

use super::harness::{expect_closed, run_shell};

#[tokio::test]
async fn add_process_registers_by_name() {
    let supervisor = Supervisor::new();
    supervisor
        .add_process(ProcessConfig::new("web", "node").with_args(["server.js"]))
        .await;

    let config = supervisor.get_config("web").await.unwrap();
    assert_eq!(config.command, "node");
    assert_eq!(config.args, vec!["server.js"]);
    assert!(supervisor.get_config("worker").await.is_none());
}

#[tokio::test]
async fn add_process_replaces_existing_definition() {
    let supervisor = Supervisor::new();
    supervisor.add_process(ProcessConfig::new("web", "node")).await;
    supervisor.add_process(ProcessConfig::new("web", "deno")).await;

    let configs = supervisor.configs().await;
    assert_eq!(configs.len(), 1);
    assert_eq!(configs["web"].command, "deno");
}

#[tokio::test]
async fn add_process_is_idempotent() {
    let supervisor = Supervisor::new();
    let config = ProcessConfig::new("web", "node").with_args(["server.js"]);
    supervisor.add_process(config.clone()).await;
    supervisor.add_process(config.clone()).await;

    assert_eq!(supervisor.configs().await.len(), 1);
    assert_eq!(supervisor.get_config("web").await.unwrap(), config);
}

#[tokio::test]
async fn sweep_launches_only_auto_start_definitions() {
    let supervisor = Supervisor::new();
    supervisor
        .add_process(ProcessConfig::new("kept", "sleep").with_args(["2"]))
        .await;
    supervisor
        .add_process(
            ProcessConfig::new("manual", "sleep")
                .with_args(["2"])
                .with_auto_start(false),
        )
        .await;

    supervisor.run_configured_processes().await;

    let children = supervisor.children().await;
    assert!(children.contains_key("kept"));
    assert!(!children.contains_key("manual"));
    children["kept"].kill();
}

#[tokio::test]
async fn sweep_continues_past_a_failing_launch() {
    let supervisor = Supervisor::new();
    supervisor
        .add_process(ProcessConfig::new("broken", "/no/such/binary-on-any-box"))
        .await;
    supervisor
        .add_process(ProcessConfig::new("good", "sleep").with_args(["2"]))
        .await;

    supervisor.run_configured_processes().await;

    let children = supervisor.children().await;
    assert!(children.contains_key("good"));
    assert!(!children.contains_key("broken"));
    children["good"].kill();
}

#[tokio::test]
async fn run_command_registers_a_config() {
    let supervisor = Supervisor::new();
    let closed = supervisor.subscribe_process_closed("echoer").await;
    run_shell(&supervisor, "echoer", "echo hi").await;

    let config = supervisor.get_config("echoer").await.unwrap();
    assert_eq!(config.command, "sh");
    assert_eq!(config.args, vec!["-c", "echo hi"]);
    assert!(config.auto_start);

    expect_closed(closed).await;
}

#[tokio::test]
async fn run_options_set_cwd_and_env() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = Supervisor::new();
    let mut events = supervisor.subscribe_events();
    let closed = supervisor.subscribe_process_closed("prober").await;

    supervisor
        .run_command(
            "prober",
            "sh",
            vec!["-c".into(), "pwd; printf '%s\\n' \"$PROBE_FLAG\"".into()],
            RunOptions::new()
                .with_cwd(dir.path())
                .with_env("PROBE_FLAG", "banana"),
            None,
        )
        .await
        .unwrap();
    expect_closed(closed).await;

    let expected_dir = std::fs::canonicalize(dir.path()).unwrap();
    let first = events.recv().await.unwrap();
    assert_eq!(
        std::fs::canonicalize(&first.message).unwrap(),
        expected_dir
    );
    let second = events.recv().await.unwrap();
    assert_eq!(second.message, "banana");
}

#[tokio::test]
async fn rerun_keeps_the_existing_auto_start_flag() {
    let supervisor = Supervisor::new();
    supervisor
        .add_process(ProcessConfig::new("manual", "sh").with_auto_start(false))
        .await;

    let closed = supervisor.subscribe_process_closed("manual").await;
    supervisor
        .run_command(
            "manual",
            "sh",
            vec!["-c".into(), "true".into()],
            RunOptions::new(),
            None,
        )
        .await
        .unwrap();
    expect_closed(closed).await;

    let config = supervisor.get_config("manual").await.unwrap();
    assert!(!config.auto_start, "re-registration must not flip the flag");
}
