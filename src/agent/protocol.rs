use std::path::PathBuf;

use async_trait::async_trait;

use crate::agent::error::AgentError;

/// Client side of the agent's session-control protocol
///
/// Server-pushed events are not part of the trait: implementations hand
/// out a single ordered `mpsc::Receiver<ProtocolEvent>` when they are
/// created, and the consumer drains it one event at a time.
#[async_trait]
pub trait SessionProtocol: Send + Sync {
    /// Attach to an existing session. Resuming an already resumed session is a no-op.
    async fn resume_session(&self, session_id: &str) -> Result<(), AgentError>;

    /// Submit `prompt` to a resumed session and return the outgoing message id.
    ///
    /// Completion is reported later through a `SessionIdle` event.
    async fn send(&self, session_id: &str, prompt: &str) -> Result<String, AgentError>;

    /// Cancel whatever the session is doing. The outcome arrives as events.
    async fn abort(&self, session_id: &str) -> Result<(), AgentError>;

    fn is_resumed(&self, session_id: &str) -> bool;

    /// Release every resumed session and the connection. Safe to call more than once.
    async fn close(&self);
}

/// How to launch the protocol server
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    pub binary: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            binary: "copilot".to_string(),
            args: vec!["--server".to_string(), "--stdio".to_string()],
            working_dir: None,
        }
    }
}

impl ProtocolConfig {
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }
}
