//! Session-protocol adapter for the Copilot CLI server mode
//!
//! The CLI speaks newline-delimited JSON-RPC 2.0 over stdio. We send
//! `session.resume`, `session.send`, `session.abort` and `session.destroy`
//! requests; the server pushes `session.event` notifications and issues
//! `permission.request` / `userInput.request` requests that stay open
//! until the user (or the configured policy) answers.

use std::collections::{HashMap, HashSet};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};

use crate::agent::error::AgentError;
use crate::agent::events::{
    PermissionDecision, PermissionRequest, ProtocolEvent, ProtocolEventKind, Responder,
    UserInputAnswer, UserInputRequest,
};
use crate::agent::protocol::{ProtocolConfig, SessionProtocol};
use crate::history::ToolExecutionData;

const EVENT_CHANNEL_CAPACITY: usize = 256;
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

type PendingMap = HashMap<i64, oneshot::Sender<Result<Value, AgentError>>>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

#[derive(Clone)]
struct JsonRpcPeer {
    writer: Arc<tokio::sync::Mutex<BoxedWriter>>,
    pending: Arc<Mutex<PendingMap>>,
    id_counter: Arc<AtomicI64>,
}

impl JsonRpcPeer {
    fn new(writer: BoxedWriter) -> Self {
        Self {
            writer: Arc::new(tokio::sync::Mutex::new(writer)),
            pending: Arc::new(Mutex::new(HashMap::new())),
            id_counter: Arc::new(AtomicI64::new(1)),
        }
    }

    async fn send(&self, message: &Value) -> Result<(), AgentError> {
        let raw = serde_json::to_string(message)?;
        let mut guard = self.writer.lock().await;
        guard.write_all(raw.as_bytes()).await?;
        guard.write_all(b"\n").await?;
        guard.flush().await?;
        Ok(())
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, AgentError> {
        let id = self.id_counter.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let message = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        if let Err(e) = self.send(&message).await {
            self.pending.lock().remove(&id);
            return Err(e);
        }

        rx.await.map_err(|_| AgentError::Disconnected)?
    }

    async fn respond(&self, id: Value, result: Value) -> Result<(), AgentError> {
        self.send(&json!({"jsonrpc": "2.0", "id": id, "result": result}))
            .await
    }

    async fn respond_error(&self, id: Value, code: i64, message: &str) -> Result<(), AgentError> {
        self.send(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": code, "message": message},
        }))
        .await
    }

    fn resolve(&self, id: i64, result: Result<Value, AgentError>) {
        if let Some(tx) = self.pending.lock().remove(&id) {
            if tx.send(result).is_err() {
                tracing::debug!("Dropping JSON-RPC response; receiver already closed");
            }
        }
    }

    /// Fail every outstanding request.
    fn fail_all(&self) {
        self.pending.lock().clear();
    }
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct IncomingMessage {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Value,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionEventParams {
    session_id: String,
    #[serde(default)]
    event: PushedEvent,
}

#[derive(Debug, Default, Deserialize)]
struct PushedEvent {
    #[serde(rename = "type", default)]
    event_type: String,
    #[serde(default)]
    data: Value,
}

/// Adapter over a Copilot CLI running in server mode
pub struct CopilotAdapter {
    peer: JsonRpcPeer,
    resumed: Arc<Mutex<HashSet<String>>>,
    /// Serializes resumes of one session so only one request goes out
    resume_gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    child: Mutex<Option<Child>>,
    closed: Arc<AtomicBool>,
}

impl CopilotAdapter {
    /// Launch the CLI in server mode and connect to its stdio.
    pub fn spawn(
        config: &ProtocolConfig,
    ) -> Result<(Self, mpsc::Receiver<ProtocolEvent>), AgentError> {
        let binary = which::which(&config.binary)
            .map_err(|_| AgentError::BinaryNotFound(config.binary.clone()))?;

        let mut cmd = Command::new(&binary);
        cmd.args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &config.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            tracing::warn!(binary = %binary.display(), error = %e, "Failed to spawn protocol server");
            AgentError::ProcessSpawnFailed
        })?;
        let stdin = child.stdin.take().ok_or(AgentError::StdioCaptureFailed)?;
        let stdout = child.stdout.take().ok_or(AgentError::StdioCaptureFailed)?;

        tracing::info!(binary = %binary.display(), pid = ?child.id(), "Started protocol server");

        let (adapter, events) = Self::connect(stdout, stdin);
        *adapter.child.lock() = Some(child);
        Ok((adapter, events))
    }

    /// Run the protocol over an arbitrary transport.
    pub fn connect<R, W>(reader: R, writer: W) -> (Self, mpsc::Receiver<ProtocolEvent>)
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let peer = JsonRpcPeer::new(Box::new(writer));
        let resumed = Arc::new(Mutex::new(HashSet::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        tokio::spawn(read_loop(
            reader,
            peer.clone(),
            resumed.clone(),
            closed.clone(),
            tx,
        ));

        (
            Self {
                peer,
                resumed,
                resume_gates: Mutex::new(HashMap::new()),
                child: Mutex::new(None),
                closed,
            },
            rx,
        )
    }

    pub fn resumed_sessions(&self) -> Vec<String> {
        self.resumed.lock().iter().cloned().collect()
    }
}

#[async_trait]
impl SessionProtocol for CopilotAdapter {
    async fn resume_session(&self, session_id: &str) -> Result<(), AgentError> {
        if self.is_resumed(session_id) {
            return Ok(());
        }

        let gate = self
            .resume_gates
            .lock()
            .entry(session_id.to_string())
            .or_default()
            .clone();
        let _resuming = gate.lock().await;
        // A concurrent resume may have finished while we waited
        if self.is_resumed(session_id) {
            return Ok(());
        }

        self.peer
            .request(
                "session.resume",
                json!({"sessionId": session_id, "streaming": true}),
            )
            .await?;

        self.resumed.lock().insert(session_id.to_string());
        tracing::debug!(session_id = %session_id, "Resumed session");
        Ok(())
    }

    async fn send(&self, session_id: &str, prompt: &str) -> Result<String, AgentError> {
        if !self.is_resumed(session_id) {
            return Err(AgentError::NotResumed(session_id.to_string()));
        }

        let result = self
            .peer
            .request(
                "session.send",
                json!({"sessionId": session_id, "prompt": prompt}),
            )
            .await?;

        result
            .get("messageId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AgentError::InvalidResponse(result.to_string()))
    }

    async fn abort(&self, session_id: &str) -> Result<(), AgentError> {
        if !self.is_resumed(session_id) {
            return Err(AgentError::NotResumed(session_id.to_string()));
        }
        self.peer
            .request("session.abort", json!({"sessionId": session_id}))
            .await?;
        Ok(())
    }

    fn is_resumed(&self, session_id: &str) -> bool {
        self.resumed.lock().contains(session_id)
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let sessions: Vec<String> = self.resumed.lock().drain().collect();
        for session_id in sessions {
            let destroy = self
                .peer
                .request("session.destroy", json!({"sessionId": session_id}));
            match tokio::time::timeout(CLOSE_TIMEOUT, destroy).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::debug!(session_id = %session_id, error = %e, "Failed to destroy session")
                }
                Err(_) => tracing::debug!(session_id = %session_id, "Timed out destroying session"),
            }
        }

        let child = self.child.lock().take();
        if let Some(mut child) = child {
            if let Err(e) = child.start_kill() {
                tracing::debug!(error = %e, "Failed to stop protocol server");
            }
        }
        self.peer.fail_all();
    }
}

async fn read_loop<R>(
    reader: R,
    peer: JsonRpcPeer,
    resumed: Arc<Mutex<HashSet<String>>>,
    closed: Arc<AtomicBool>,
    tx: mpsc::Sender<ProtocolEvent>,
) where
    R: AsyncRead + Send + Unpin + 'static,
{
    let mut lines = BufReader::new(reader).lines();
    let reason = loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<IncomingMessage>(line) {
                    Ok(message) => dispatch(message, &peer, &tx).await,
                    Err(e) => tracing::warn!(error = %e, "Failed to parse protocol message"),
                }
            }
            Ok(None) => break "connection closed".to_string(),
            Err(e) => break e.to_string(),
        }
    };

    peer.fail_all();
    resumed.lock().clear();
    if !closed.load(Ordering::SeqCst) {
        tracing::warn!(reason = %reason, "Protocol connection lost");
        let _ = tx
            .send(ProtocolEvent {
                session_id: String::new(),
                kind: ProtocolEventKind::Disconnected { reason },
            })
            .await;
    }
}

async fn dispatch(message: IncomingMessage, peer: &JsonRpcPeer, tx: &mpsc::Sender<ProtocolEvent>) {
    match (message.id, message.method) {
        // Response to one of our requests
        (Some(id), None) => {
            let Some(id) = id.as_i64() else {
                tracing::debug!(id = %id, "Response with foreign id");
                return;
            };
            let result = match (message.result, message.error) {
                (_, Some(err)) => Err(AgentError::Rpc {
                    code: err.code,
                    message: err.message,
                }),
                (Some(result), None) => Ok(result),
                (None, None) => Ok(Value::Null),
            };
            peer.resolve(id, result);
        }
        // Server-initiated request
        (Some(id), Some(method)) => handle_server_request(id, &method, message.params, peer, tx).await,
        // Notification
        (None, Some(method)) => {
            if method != "session.event" {
                tracing::trace!(method = %method, "Ignoring notification");
                return;
            }
            let params: SessionEventParams = match serde_json::from_value(message.params) {
                Ok(params) => params,
                Err(e) => {
                    tracing::debug!(error = %e, "Malformed session event");
                    return;
                }
            };
            let event = ProtocolEvent {
                session_id: params.session_id,
                kind: convert_session_event(&params.event.event_type, &params.event.data),
            };
            if tx.send(event).await.is_err() {
                tracing::debug!("Protocol event receiver dropped");
            }
        }
        (None, None) => tracing::trace!("Ignoring message without id or method"),
    }
}

async fn handle_server_request(
    id: Value,
    method: &str,
    params: Value,
    peer: &JsonRpcPeer,
    tx: &mpsc::Sender<ProtocolEvent>,
) {
    let session_id = params
        .get("sessionId")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    match method {
        "permission.request" => {
            let request = params.get("permissionRequest").unwrap_or(&params);
            let (responder, rx) = Responder::new(PermissionDecision::Deny);
            let event = ProtocolEvent {
                session_id,
                kind: ProtocolEventKind::Permission(PermissionRequest {
                    tool_name: permission_tool_name(request),
                    action: permission_action(request),
                    responder,
                }),
            };
            // A failed send drops the responder, which answers with the fallback
            let _ = tx.send(event).await;

            let peer = peer.clone();
            tokio::spawn(async move {
                let decision = rx.await.unwrap_or(PermissionDecision::Deny);
                let kind = match decision {
                    PermissionDecision::Allow => "approved",
                    PermissionDecision::Deny => "denied-interactively-by-user",
                };
                if let Err(e) = peer.respond(id, json!({"kind": kind})).await {
                    tracing::debug!(error = %e, "Failed to answer permission request");
                }
            });
        }
        "userInput.request" => {
            let question = params
                .get("question")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let choices: Vec<String> = params
                .get("choices")
                .and_then(Value::as_array)
                .map(|c| c.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default();
            let allow_freeform = params
                .get("allowFreeform")
                .and_then(Value::as_bool)
                .unwrap_or(true);

            let (responder, rx) = Responder::new(UserInputAnswer::default());
            let event = ProtocolEvent {
                session_id,
                kind: ProtocolEventKind::UserInput(UserInputRequest {
                    question,
                    choices,
                    allow_freeform,
                    responder,
                }),
            };
            let _ = tx.send(event).await;

            let peer = peer.clone();
            tokio::spawn(async move {
                let answer = rx.await.unwrap_or_default();
                let result = serde_json::to_value(&answer).unwrap_or(Value::Null);
                if let Err(e) = peer.respond(id, result).await {
                    tracing::debug!(error = %e, "Failed to answer user input request");
                }
            });
        }
        other => {
            tracing::debug!(method = %other, "Unsupported server request");
            if let Err(e) = peer.respond_error(id, -32601, "method not found").await {
                tracing::debug!(error = %e, "Failed to reject server request");
            }
        }
    }
}

fn permission_tool_name(request: &Value) -> String {
    ["toolName", "kind"]
        .iter()
        .find_map(|k| request.get(*k).and_then(Value::as_str))
        .unwrap_or("unknown")
        .to_string()
}

fn permission_action(request: &Value) -> String {
    ["fullCommandText", "command", "path", "fileName", "url", "intention"]
        .iter()
        .find_map(|k| request.get(*k).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

/// Map a pushed `session.event` onto our event kinds.
fn convert_session_event(event_type: &str, data: &Value) -> ProtocolEventKind {
    let text = |key: &str| {
        data.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    match event_type {
        "session.idle" => ProtocolEventKind::SessionIdle,
        "assistant.message_delta" => ProtocolEventKind::MessageDelta {
            delta: text("deltaContent"),
        },
        "assistant.message" => ProtocolEventKind::AssistantMessage {
            message_id: text("messageId"),
            content: text("content"),
        },
        "tool.execution_start" => ProtocolEventKind::ToolStarted {
            tool_call_id: text("toolCallId"),
            tool_name: text("toolName"),
        },
        "tool.execution_complete" => {
            let execution =
                ToolExecutionData::deserialize(data).unwrap_or_else(|_| ToolExecutionData {
                    tool_call_id: text("toolCallId"),
                    ..ToolExecutionData::default()
                });
            ProtocolEventKind::ToolCompleted {
                summary: execution.summary(),
                tool_call_id: execution.tool_call_id,
                success: execution.success,
            }
        }
        "session.error" => ProtocolEventKind::Error {
            message: text("message"),
        },
        other => ProtocolEventKind::Other {
            event_type: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_tool_complete() {
        let kind = convert_session_event(
            "tool.execution_complete",
            &json!({"toolCallId": "tc1", "success": true, "result": {"content": "ok"}}),
        );
        match kind {
            ProtocolEventKind::ToolCompleted {
                tool_call_id,
                success,
                summary,
            } => {
                assert_eq!(tool_call_id, "tc1");
                assert!(success);
                assert_eq!(summary, "ok");
            }
            other => panic!("Expected ToolCompleted, got {other:?}"),
        }
    }

    #[test]
    fn test_convert_failed_tool_complete_has_summary() {
        let summary = |data: Value| match convert_session_event("tool.execution_complete", &data) {
            ProtocolEventKind::ToolCompleted { summary, .. } => summary,
            other => panic!("Expected ToolCompleted, got {other:?}"),
        };

        assert_eq!(
            summary(json!({"toolCallId": "tc1", "success": false, "error": {"message": "permission denied"}})),
            "permission denied"
        );
        assert_eq!(
            summary(json!({"toolCallId": "tc1", "success": false, "result": {"content": "", "detailedContent": "exit 2"}})),
            "exit 2"
        );
        assert_eq!(summary(json!({"toolCallId": "tc1", "success": false})), "failed");
        assert_eq!(summary(json!({"toolCallId": "tc1", "success": true})), "");
    }

    #[test]
    fn test_convert_unknown_event() {
        match convert_session_event("session.usage", &Value::Null) {
            ProtocolEventKind::Other { event_type } => assert_eq!(event_type, "session.usage"),
            other => panic!("Expected Other, got {other:?}"),
        }
    }

    #[test]
    fn test_permission_fields() {
        let request = json!({"kind": "shell", "fullCommandText": "rm -rf target"});
        assert_eq!(permission_tool_name(&request), "shell");
        assert_eq!(permission_action(&request), "rm -rf target");
    }
}
