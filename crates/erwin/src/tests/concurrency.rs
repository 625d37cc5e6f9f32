//! Isolation across concurrent processes.

use futures::future::join_all;

use crate::event::StreamKind;
use crate::supervisor::{RunOptions, Supervisor};

use super::harness::{assert_no_more_events, collect_events, WAIT};

#[tokio::test]
async fn concurrent_processes_stay_isolated_by_name() {
    let supervisor = Supervisor::new();
    let mut events = supervisor.subscribe_events();

    let a = supervisor.run_command(
        "a",
        "sh",
        vec!["-c".into(), "echo foo".into()],
        RunOptions::new(),
        None,
    );
    let b = supervisor.run_command(
        "b",
        "sh",
        vec!["-c".into(), "echo jimmy; echo hendrix 1>&2".into()],
        RunOptions::new(),
        None,
    );
    let (a, b) = tokio::join!(a, b);
    a.unwrap();
    b.unwrap();

    let collected = collect_events(&mut events, 3).await;

    let a_messages: Vec<&str> = collected
        .iter()
        .filter(|e| e.name == "a")
        .map(|e| e.message.as_str())
        .collect();
    assert_eq!(a_messages, vec!["foo"]);

    let b_out: Vec<&str> = collected
        .iter()
        .filter(|e| e.name == "b" && e.stream == StreamKind::Stdout)
        .map(|e| e.message.as_str())
        .collect();
    let b_err: Vec<&str> = collected
        .iter()
        .filter(|e| e.name == "b" && e.stream == StreamKind::Stderr)
        .map(|e| e.message.as_str())
        .collect();
    assert_eq!(b_out, vec!["jimmy"]);
    assert_eq!(b_err, vec!["hendrix"]);

    assert_no_more_events(&mut events).await;
}

#[tokio::test]
async fn many_concurrent_launches_each_deliver_their_own_lines() {
    let supervisor = Supervisor::new();
    let mut events = supervisor.subscribe_events();
    let mut all_closed = supervisor.subscribe_all_closed();

    let names: Vec<String> = (0..5).map(|i| format!("proc-{i}")).collect();
    let launches = names.iter().map(|name| {
        supervisor.run_command(
            name,
            "sh",
            vec!["-c".into(), format!("echo {name}")],
            RunOptions::new(),
            None,
        )
    });
    for result in join_all(launches).await {
        result.unwrap();
    }

    let collected = collect_events(&mut events, names.len()).await;
    for name in &names {
        let own: Vec<&str> = collected
            .iter()
            .filter(|e| e.name == *name)
            .map(|e| e.message.as_str())
            .collect();
        assert_eq!(own, vec![name.as_str()]);
    }

    tokio::time::timeout(WAIT, all_closed.recv())
        .await
        .expect("timed out waiting for drain")
        .unwrap();
}

#[tokio::test]
async fn launched_process_is_visible_before_run_command_returns() {
    let supervisor = Supervisor::new();
    supervisor
        .run_command(
            "visible",
            "sh",
            vec!["-c".into(), "sleep 2".into()],
            RunOptions::new(),
            None,
        )
        .await
        .unwrap();

    let children = supervisor.children().await;
    let handle = children.get("visible").expect("not visible after launch");
    assert_eq!(handle.name(), "visible");
    assert!(handle.pid().is_some());
    handle.kill();
}
