use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Event pushed by the session protocol, in arrival order
#[derive(Debug)]
pub struct ProtocolEvent {
    pub session_id: String,
    pub kind: ProtocolEventKind,
}

#[derive(Debug)]
pub enum ProtocolEventKind {
    /// The session finished processing; no message is in flight
    SessionIdle,

    /// Streaming assistant text
    MessageDelta { delta: String },

    /// A complete assistant message
    AssistantMessage { message_id: String, content: String },

    /// Tool execution started
    ToolStarted {
        tool_call_id: String,
        tool_name: String,
    },

    /// Tool execution finished
    ToolCompleted {
        tool_call_id: String,
        success: bool,
        summary: String,
    },

    /// Session-level error reported by the agent
    Error { message: String },

    /// The agent is blocked until this permission request is answered
    Permission(PermissionRequest),

    /// The agent is blocked until this question is answered
    UserInput(UserInputRequest),

    /// The protocol connection went away; every resumed session is gone
    Disconnected { reason: String },

    /// Raw/unknown event (for forward compatibility)
    Other { event_type: String },
}

impl ProtocolEventKind {
    pub fn event_type_name(&self) -> &'static str {
        match self {
            ProtocolEventKind::SessionIdle => "SessionIdle",
            ProtocolEventKind::MessageDelta { .. } => "MessageDelta",
            ProtocolEventKind::AssistantMessage { .. } => "AssistantMessage",
            ProtocolEventKind::ToolStarted { .. } => "ToolStarted",
            ProtocolEventKind::ToolCompleted { .. } => "ToolCompleted",
            ProtocolEventKind::Error { .. } => "Error",
            ProtocolEventKind::Permission(_) => "Permission",
            ProtocolEventKind::UserInput(_) => "UserInput",
            ProtocolEventKind::Disconnected { .. } => "Disconnected",
            ProtocolEventKind::Other { .. } => "Other",
        }
    }
}

/// Single-use reply slot.
///
/// [`Responder::respond`] consumes the slot, so a second reply cannot be
/// written. Dropping an unanswered responder sends its fallback, so the
/// waiting side always gets exactly one answer.
pub struct Responder<T> {
    tx: Option<oneshot::Sender<T>>,
    fallback: Option<T>,
}

impl<T> Responder<T> {
    pub fn new(fallback: T) -> (Self, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Some(tx),
                fallback: Some(fallback),
            },
            rx,
        )
    }

    /// Deliver `value`. Returns `false` if the requester stopped waiting.
    pub fn respond(mut self, value: T) -> bool {
        self.fallback = None;
        match self.tx.take() {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }

    /// Whether the requester is still waiting for an answer.
    pub fn is_open(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }
}

impl<T> Drop for Responder<T> {
    fn drop(&mut self) {
        if let (Some(tx), Some(fallback)) = (self.tx.take(), self.fallback.take()) {
            tracing::debug!("Responder dropped unanswered; sending fallback");
            let _ = tx.send(fallback);
        }
    }
}

impl<T> fmt::Debug for Responder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("open", &self.is_open())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionDecision {
    Allow,
    Deny,
}

/// Tool permission gate raised by the agent
#[derive(Debug)]
pub struct PermissionRequest {
    pub tool_name: String,
    /// What the tool wants to do (command line, file path, ...)
    pub action: String,
    pub responder: Responder<PermissionDecision>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInputAnswer {
    pub answer: String,
    pub was_freeform: bool,
}

/// Free-form question raised by the agent
#[derive(Debug)]
pub struct UserInputRequest {
    pub question: String,
    pub choices: Vec<String>,
    pub allow_freeform: bool,
    pub responder: Responder<UserInputAnswer>,
}
