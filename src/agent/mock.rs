//! Mock session protocol for deterministic testing
//!
//! Implements [`SessionProtocol`] without a real agent process. Calls are
//! captured for later assertions, and tests push server-side events
//! through [`MockProtocol::emit`].
//!
//! # Example
//! ```no_run
//! use icq::agent::mock::MockProtocol;
//! use icq::agent::{ProtocolEventKind, SessionProtocol};
//!
//! #[tokio::test]
//! async fn test_send_flow() {
//!     let (protocol, mut events) = MockProtocol::new();
//!     protocol.resume_session("s1").await.unwrap();
//!     protocol.send("s1", "hello").await.unwrap();
//!     protocol.emit("s1", ProtocolEventKind::SessionIdle).await;
//!     assert_eq!(protocol.sent().len(), 1);
//! }
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::agent::error::AgentError;
use crate::agent::events::{ProtocolEvent, ProtocolEventKind};
use crate::agent::protocol::SessionProtocol;

/// A message captured by [`MockProtocol::send`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub session_id: String,
    pub prompt: String,
    pub message_id: String,
}

pub struct MockProtocol {
    events: mpsc::Sender<ProtocolEvent>,
    resumed: Mutex<HashSet<String>>,
    sent: Mutex<Vec<SentMessage>>,
    resume_calls: Mutex<Vec<String>>,
    aborted: Mutex<Vec<String>>,
    fail_resume: AtomicBool,
    fail_send: AtomicBool,
    closed: AtomicBool,
    counter: AtomicUsize,
}

impl MockProtocol {
    pub fn new() -> (Self, mpsc::Receiver<ProtocolEvent>) {
        let (tx, rx) = mpsc::channel(64);
        (
            Self {
                events: tx,
                resumed: Mutex::new(HashSet::new()),
                sent: Mutex::new(Vec::new()),
                resume_calls: Mutex::new(Vec::new()),
                aborted: Mutex::new(Vec::new()),
                fail_resume: AtomicBool::new(false),
                fail_send: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                counter: AtomicUsize::new(0),
            },
            rx,
        )
    }

    /// Make every `resume_session` call fail
    pub fn failing_resume(self) -> Self {
        self.fail_resume.store(true, Ordering::SeqCst);
        self
    }

    /// Make every `send` call fail
    pub fn failing_send(self) -> Self {
        self.fail_send.store(true, Ordering::SeqCst);
        self
    }

    /// Push a server-side event to the consumer
    pub async fn emit(&self, session_id: &str, kind: ProtocolEventKind) {
        let event = ProtocolEvent {
            session_id: session_id.to_string(),
            kind,
        };
        if self.events.send(event).await.is_err() {
            tracing::debug!("Mock protocol receiver dropped");
        }
    }

    /// Captured sends, oldest first
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    /// Session ids passed to `resume_session`, including repeats
    pub fn resume_calls(&self) -> Vec<String> {
        self.resume_calls.lock().clone()
    }

    pub fn aborted(&self) -> Vec<String> {
        self.aborted.lock().clone()
    }

    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionProtocol for MockProtocol {
    async fn resume_session(&self, session_id: &str) -> Result<(), AgentError> {
        self.resume_calls.lock().push(session_id.to_string());
        if self.fail_resume.load(Ordering::SeqCst) {
            return Err(AgentError::Disconnected);
        }
        self.resumed.lock().insert(session_id.to_string());
        Ok(())
    }

    async fn send(&self, session_id: &str, prompt: &str) -> Result<String, AgentError> {
        if !self.is_resumed(session_id) {
            return Err(AgentError::NotResumed(session_id.to_string()));
        }
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(AgentError::Rpc {
                code: -32000,
                message: "mock send failure".into(),
            });
        }

        let message_id = format!("msg-{}", self.counter.fetch_add(1, Ordering::SeqCst) + 1);
        self.sent.lock().push(SentMessage {
            session_id: session_id.to_string(),
            prompt: prompt.to_string(),
            message_id: message_id.clone(),
        });
        Ok(message_id)
    }

    async fn abort(&self, session_id: &str) -> Result<(), AgentError> {
        self.aborted.lock().push(session_id.to_string());
        Ok(())
    }

    fn is_resumed(&self, session_id: &str) -> bool {
        self.resumed.lock().contains(session_id)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.resumed.lock().clear();
    }
}
