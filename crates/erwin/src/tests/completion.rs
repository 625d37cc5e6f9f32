//! Completion hook semantics.

use tokio::sync::oneshot;
use tokio::time::timeout;

use crate::error::ErwinError;
use crate::supervisor::{CompletionHook, RunOptions, Supervisor};

use super::harness::WAIT;

/// Hook that forwards its completion into a oneshot.
fn capture() -> (CompletionHook, oneshot::Receiver<Option<ErwinError>>) {
    let (tx, rx) = oneshot::channel();
    let hook: CompletionHook = Box::new(move |completion| {
        let _ = tx.send(completion);
    });
    (hook, rx)
}

async fn launch_shell_with_hook(
    supervisor: &Supervisor,
    name: &str,
    script: &str,
) -> oneshot::Receiver<Option<ErwinError>> {
    let (hook, rx) = capture();
    supervisor
        .run_command(
            name,
            "sh",
            vec!["-c".into(), script.into()],
            RunOptions::new(),
            Some(hook),
        )
        .await
        .expect("launch failed");
    rx
}

#[tokio::test]
async fn clean_exit_completes_with_none() {
    let supervisor = Supervisor::new();
    let rx = launch_shell_with_hook(&supervisor, "ok", "exit 0").await;

    let completion = timeout(WAIT, rx).await.expect("timed out").expect("hook dropped");
    assert!(completion.is_none());
}

#[tokio::test]
async fn failure_exit_completes_with_error_naming_the_process() {
    let supervisor = Supervisor::new();
    let rx = launch_shell_with_hook(&supervisor, "loud", "exit 3").await;

    let completion = timeout(WAIT, rx).await.expect("timed out").expect("hook dropped");
    let err = completion.expect("expected an error completion");
    assert!(matches!(err, ErwinError::NonZeroExit { .. }));
    let message = err.to_string();
    assert!(message.contains("loud"), "missing name: {message}");
    assert!(message.contains("sh"), "missing command: {message}");
}

#[tokio::test]
async fn spawn_failure_reports_through_the_hook() {
    let supervisor = Supervisor::new();
    let (hook, rx) = capture();
    supervisor
        .run_command(
            "ghost",
            "/no/such/binary-on-any-box",
            vec![],
            RunOptions::new(),
            Some(hook),
        )
        .await
        .expect("spawn failure must not surface as Err");

    let completion = timeout(WAIT, rx).await.expect("timed out").expect("hook dropped");
    let err = completion.expect("expected a spawn error");
    assert!(matches!(err, ErwinError::Spawn { .. }));
    let message = err.to_string();
    assert!(message.contains("ghost"), "missing name: {message}");
    assert!(message.contains("/no/such/binary-on-any-box"), "missing command: {message}");
    assert!(!supervisor.children().await.contains_key("ghost"));
}

#[tokio::test]
async fn killed_process_completes_with_error() {
    let supervisor = Supervisor::new();
    let rx = launch_shell_with_hook(&supervisor, "sleeper", "sleep 30").await;

    supervisor.children().await["sleeper"].kill();

    let completion = timeout(WAIT, rx).await.expect("timed out").expect("hook dropped");
    assert!(matches!(
        completion,
        Some(ErwinError::NonZeroExit { .. })
    ));
}

#[tokio::test]
async fn duplicate_name_is_rejected_without_invoking_the_hook() {
    let supervisor = Supervisor::new();
    supervisor
        .run_command(
            "dup",
            "sh",
            vec!["-c".into(), "sleep 2".into()],
            RunOptions::new(),
            None,
        )
        .await
        .expect("first launch failed");

    let (hook, mut rx) = capture();
    let second = supervisor
        .run_command(
            "dup",
            "sh",
            vec!["-c".into(), "echo never".into()],
            RunOptions::new(),
            Some(hook),
        )
        .await;

    assert!(matches!(second, Err(ErwinError::DuplicateName(name)) if name == "dup"));
    // Rejected launches never complete, so the hook is dropped unused.
    assert!(rx.try_recv().is_err());
    assert!(supervisor.children().await.contains_key("dup"));
    supervisor.children().await["dup"].kill();
}
