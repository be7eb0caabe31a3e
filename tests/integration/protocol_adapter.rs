//! Integration tests for the Copilot session-protocol adapter
//!
//! Drives [`CopilotAdapter`] over an in-memory duplex pipe against a
//! scripted JSON-RPC server.

use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf};
use tokio::sync::mpsc;

use icq::agent::{
    AgentError, CopilotAdapter, PermissionDecision, ProtocolEvent, ProtocolEventKind,
    SessionProtocol, UserInputAnswer,
};

/// Server end of the pipe
struct FakeServer {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
}

impl FakeServer {
    async fn recv(&mut self) -> Value {
        let line = tokio::time::timeout(Duration::from_secs(2), self.lines.next_line())
            .await
            .expect("client message in time")
            .expect("read from client")
            .expect("client still connected");
        serde_json::from_str(&line).expect("client sent valid JSON")
    }

    async fn send(&mut self, message: Value) {
        let mut raw = message.to_string();
        raw.push('\n');
        self.writer.write_all(raw.as_bytes()).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Answer the next request, checking its method.
    async fn reply(&mut self, method: &str, result: Value) -> Value {
        let request = self.recv().await;
        assert_eq!(request["method"], method);
        self.send(json!({"jsonrpc": "2.0", "id": request["id"], "result": result}))
            .await;
        request
    }

    async fn push_event(&mut self, session_id: &str, event_type: &str, data: Value) {
        self.send(json!({
            "jsonrpc": "2.0",
            "method": "session.event",
            "params": {"sessionId": session_id, "event": {"type": event_type, "data": data}},
        }))
        .await;
    }
}

fn connect() -> (CopilotAdapter, mpsc::Receiver<ProtocolEvent>, FakeServer) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (client_read, client_write) = tokio::io::split(client);
    let (server_read, server_write) = tokio::io::split(server);
    let (adapter, events) = CopilotAdapter::connect(client_read, client_write);
    (
        adapter,
        events,
        FakeServer {
            lines: BufReader::new(server_read).lines(),
            writer: server_write,
        },
    )
}

async fn next_event(events: &mut mpsc::Receiver<ProtocolEvent>) -> ProtocolEvent {
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("event in time")
        .expect("event channel open")
}

#[tokio::test]
async fn test_resume_send_and_idle() {
    let (adapter, mut events, mut server) = connect();

    let (resumed, request) = tokio::join!(
        adapter.resume_session("s1"),
        server.reply("session.resume", json!({}))
    );
    resumed.unwrap();
    assert_eq!(request["params"]["sessionId"], "s1");
    assert!(adapter.is_resumed("s1"));

    // Second resume is answered locally
    adapter.resume_session("s1").await.unwrap();

    let (sent, request) = tokio::join!(
        adapter.send("s1", "fix the build"),
        server.reply("session.send", json!({"messageId": "m1"}))
    );
    assert_eq!(sent.unwrap(), "m1");
    assert_eq!(request["params"]["prompt"], "fix the build");

    server
        .push_event("s1", "assistant.message_delta", json!({"deltaContent": "On it"}))
        .await;
    server.push_event("s1", "session.idle", json!({})).await;

    let streamed = next_event(&mut events).await;
    assert!(matches!(
        streamed.kind,
        ProtocolEventKind::MessageDelta { ref delta } if delta == "On it"
    ));
    let idle = next_event(&mut events).await;
    assert_eq!(idle.session_id, "s1");
    assert!(matches!(idle.kind, ProtocolEventKind::SessionIdle));
}

#[tokio::test]
async fn test_concurrent_resumes_send_one_request() {
    let (adapter, _events, mut server) = connect();

    let (first, second, request) = tokio::join!(
        adapter.resume_session("s1"),
        adapter.resume_session("s1"),
        server.reply("session.resume", json!({}))
    );
    first.unwrap();
    second.unwrap();
    assert_eq!(request["params"]["sessionId"], "s1");

    // The next thing on the wire is the send, not a second resume
    let (sent, _) = tokio::join!(
        adapter.send("s1", "hello"),
        server.reply("session.send", json!({"messageId": "m1"}))
    );
    assert_eq!(sent.unwrap(), "m1");
}

#[tokio::test]
async fn test_send_requires_resume() {
    let (adapter, _events, _server) = connect();
    let err = adapter.send("s1", "hello").await.unwrap_err();
    assert!(matches!(err, AgentError::NotResumed(id) if id == "s1"));
}

#[tokio::test]
async fn test_rpc_error_is_surfaced() {
    let (adapter, _events, mut server) = connect();

    let server_side = async {
        let request = server.recv().await;
        server
            .send(json!({
                "jsonrpc": "2.0",
                "id": request["id"],
                "error": {"code": -32000, "message": "no such session"},
            }))
            .await;
    };
    let (result, _) = tokio::join!(adapter.resume_session("missing"), server_side);

    assert!(matches!(
        result,
        Err(AgentError::Rpc { code: -32000, ref message }) if message == "no such session"
    ));
    assert!(!adapter.is_resumed("missing"));
}

#[tokio::test]
async fn test_permission_request_round_trip() {
    let (_adapter, mut events, mut server) = connect();

    server
        .send(json!({
            "jsonrpc": "2.0",
            "id": "p1",
            "method": "permission.request",
            "params": {
                "sessionId": "s1",
                "permissionRequest": {"kind": "shell", "fullCommandText": "cargo test"},
            },
        }))
        .await;

    let event = next_event(&mut events).await;
    assert_eq!(event.session_id, "s1");
    let request = match event.kind {
        ProtocolEventKind::Permission(request) => request,
        other => panic!("Expected Permission, got {other:?}"),
    };
    assert_eq!(request.tool_name, "shell");
    assert_eq!(request.action, "cargo test");
    assert!(request.responder.respond(PermissionDecision::Allow));

    let reply = server.recv().await;
    assert_eq!(reply["id"], "p1");
    assert_eq!(reply["result"]["kind"], "approved");
}

#[tokio::test]
async fn test_unanswered_permission_is_denied() {
    let (_adapter, mut events, mut server) = connect();

    server
        .send(json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "permission.request",
            "params": {"sessionId": "s1", "permissionRequest": {"kind": "write", "fileName": "a.rs"}},
        }))
        .await;

    let event = next_event(&mut events).await;
    drop(event);

    let reply = server.recv().await;
    assert_eq!(reply["id"], 7);
    assert_eq!(reply["result"]["kind"], "denied-interactively-by-user");
}

#[tokio::test]
async fn test_user_input_round_trip() {
    let (_adapter, mut events, mut server) = connect();

    server
        .send(json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "userInput.request",
            "params": {
                "sessionId": "s1",
                "question": "Which target?",
                "choices": ["debug", "release"],
                "allowFreeform": false,
            },
        }))
        .await;

    let event = next_event(&mut events).await;
    let request = match event.kind {
        ProtocolEventKind::UserInput(request) => request,
        other => panic!("Expected UserInput, got {other:?}"),
    };
    assert_eq!(request.question, "Which target?");
    assert_eq!(request.choices, vec!["debug", "release"]);
    assert!(!request.allow_freeform);
    request.responder.respond(UserInputAnswer {
        answer: "release".to_string(),
        was_freeform: false,
    });

    let reply = server.recv().await;
    assert_eq!(reply["id"], 3);
    assert_eq!(reply["result"], json!({"answer": "release", "wasFreeform": false}));
}

#[tokio::test]
async fn test_unknown_server_request_is_rejected() {
    let (_adapter, _events, mut server) = connect();

    server
        .send(json!({"jsonrpc": "2.0", "id": 11, "method": "workspace.open", "params": {}}))
        .await;

    let reply = server.recv().await;
    assert_eq!(reply["id"], 11);
    assert_eq!(reply["error"]["code"], -32601);
}

#[tokio::test]
async fn test_connection_loss_fails_pending_and_reports() {
    let (adapter, mut events, mut server) = connect();

    let server_side = async move {
        let request = server.recv().await;
        assert_eq!(request["method"], "session.resume");
        drop(server);
    };
    let (result, _) = tokio::join!(adapter.resume_session("s1"), server_side);
    assert!(matches!(result, Err(AgentError::Disconnected)));

    let event = next_event(&mut events).await;
    assert!(matches!(event.kind, ProtocolEventKind::Disconnected { .. }));
    assert!(adapter.resumed_sessions().is_empty());
}

#[tokio::test]
async fn test_close_destroys_resumed_sessions() {
    let (adapter, _events, mut server) = connect();

    let (resumed, _) = tokio::join!(
        adapter.resume_session("s1"),
        server.reply("session.resume", json!({}))
    );
    resumed.unwrap();

    let (_, destroy) = tokio::join!(adapter.close(), server.reply("session.destroy", json!({})));
    assert_eq!(destroy["params"]["sessionId"], "s1");
    assert!(!adapter.is_resumed("s1"));

    // Second close does nothing
    adapter.close().await;
}
