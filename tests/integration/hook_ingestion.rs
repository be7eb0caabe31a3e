//! Integration tests for hook ingestion
//!
//! Tests the flow: Unix socket -> HookServer -> envelope queue -> scheduler

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;

use icq::config::Config;
use icq::core::{App, AppEvent, Effect};
use icq::hooks::{HookEventKind, HookServer};
use icq::session::Session;

fn line(session: &str, event: &str, data: &str) -> String {
    format!(r#"{{"event":"{event}","sessionId":"{session}","cwd":"/work","timestamp":"2025-01-01T00:00:00Z","data":{data}}}"#)
        + "\n"
}

async fn start_server() -> (
    tempfile::TempDir,
    std::path::PathBuf,
    Arc<HookServer>,
    tokio::sync::mpsc::Receiver<icq::HookEnvelope>,
) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("run").join("icq.sock");
    let (server, rx) = HookServer::bind(&path).expect("bind hook socket");
    let server = Arc::new(server);
    tokio::spawn({
        let server = server.clone();
        async move { server.serve().await }
    });
    (dir, path, server, rx)
}

/// Three envelopes written over one connection arrive in order
#[tokio::test]
async fn test_envelopes_arrive_in_order() {
    let (_dir, path, server, mut rx) = start_server().await;

    let mut stream = UnixStream::connect(&path).await.unwrap();
    let payload = [
        line("s1", "sessionStart", "{}"),
        line("s1", "preToolUse", r#"{"toolName":"bash","toolArgs":{"command":"ls"}}"#),
        line("s1", "postToolUse", r#"{"toolName":"bash"}"#),
    ]
    .concat();
    stream.write_all(payload.as_bytes()).await.unwrap();
    stream.shutdown().await.unwrap();

    let mut events = Vec::new();
    for _ in 0..3 {
        let envelope = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("envelope in time")
            .expect("queue open");
        events.push(envelope.event);
    }
    assert_eq!(
        events,
        vec![
            HookEventKind::SessionStart,
            HookEventKind::PreToolUse,
            HookEventKind::PostToolUse
        ]
    );

    server.close();
    assert!(!path.exists());
}

/// Several connections may be open at once; each is read independently
#[tokio::test]
async fn test_concurrent_connections() {
    let (_dir, path, server, mut rx) = start_server().await;

    let mut a = UnixStream::connect(&path).await.unwrap();
    let mut b = UnixStream::connect(&path).await.unwrap();
    b.write_all(line("b", "sessionEnd", "{}").as_bytes())
        .await
        .unwrap();
    a.write_all(line("a", "sessionEnd", "{}").as_bytes())
        .await
        .unwrap();

    let mut sessions = Vec::new();
    for _ in 0..2 {
        let envelope = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("envelope in time")
            .expect("queue open");
        sessions.push(envelope.session_id);
    }
    sessions.sort();
    assert_eq!(sessions, vec!["a", "b"]);

    server.close();
    server.close();
}

/// Hook envelopes drive pending-tool bookkeeping in the scheduler
#[tokio::test]
async fn test_hooks_feed_scheduler() {
    let (_dir, path, server, mut rx) = start_server().await;
    let mut app = App::new(Config::default());
    app.update(
        AppEvent::SessionsLoaded {
            result: Ok(vec![Session::new("s1", "/work")]),
        },
        Instant::now(),
    );

    let mut stream = UnixStream::connect(&path).await.unwrap();
    stream
        .write_all(
            line(
                "s1",
                "preToolUse",
                r#"{"toolName":"bash","toolArgs":{"command":"cargo test"}}"#,
            )
            .as_bytes(),
        )
        .await
        .unwrap();

    let envelope = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    let effects = app.update(AppEvent::Hook(envelope), Instant::now());

    assert!(matches!(
        effects.as_slice(),
        [Effect::Notify(n)] if n.title == "Copilot: preToolUse" && n.body == "Session s1 in /work"
    ));
    let pending = &app.session("s1").unwrap().pending_tools;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].tool_name, "bash");
    assert!(pending[0].tool_args.contains("cargo test"));

    server.close();
}
