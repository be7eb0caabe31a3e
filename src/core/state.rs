use std::collections::VecDeque;
use std::time::Instant;

use crate::agent::{PermissionRequest, UserInputRequest};
use crate::pty::ApprovalPrompt;
use crate::session::Session;

/// Lines of PTY output kept per session
pub const PTY_HISTORY_LINES: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Sending,
    Resumed,
    PendingApproval,
}

impl SessionPhase {
    pub fn label(self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Sending => "sending",
            SessionPhase::Resumed => "resumed",
            SessionPhase::PendingApproval => "pending-approval",
        }
    }
}

/// A tool use waiting on a permission decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTool {
    pub tool_name: String,
    pub tool_args: String,
    pub denied: bool,
    pub deny_reason: Option<String>,
}

/// Permission request waiting for the user
#[derive(Debug)]
pub struct ParkedPermission {
    pub request: PermissionRequest,
    pub deadline: Instant,
}

/// Question waiting for the user
#[derive(Debug)]
pub struct ParkedUserInput {
    pub request: UserInputRequest,
    pub deadline: Instant,
}

/// Everything the scheduler tracks for one session
#[derive(Debug)]
pub struct SessionState {
    pub session: Session,
    /// Log changes seen while another session was selected
    pub unread: usize,
    /// A message is in flight
    pub sending: bool,
    /// Attached through the session protocol
    pub resumed: bool,
    /// The interactive subprocess is running
    pub pty_active: bool,
    /// Set when the protocol or subprocess died under this session
    pub not_resumable: Option<String>,
    pub pending_tools: Vec<PendingTool>,
    pub permissions: VecDeque<ParkedPermission>,
    pub user_inputs: VecDeque<ParkedUserInput>,
    pub prompt: Option<ApprovalPrompt>,
    /// Assistant text streamed since the last complete message
    pub streaming: String,
    pub pty_lines: VecDeque<String>,
    /// Total PTY lines ever recorded (for incremental display)
    pub pty_lines_total: u64,
}

impl SessionState {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            unread: 0,
            sending: false,
            resumed: false,
            pty_active: false,
            not_resumable: None,
            pending_tools: Vec::new(),
            permissions: VecDeque::new(),
            user_inputs: VecDeque::new(),
            prompt: None,
            streaming: String::new(),
            pty_lines: VecDeque::new(),
            pty_lines_total: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.session.id
    }

    pub fn phase(&self) -> SessionPhase {
        if !self.permissions.is_empty() || !self.user_inputs.is_empty() || self.prompt.is_some() {
            SessionPhase::PendingApproval
        } else if self.sending {
            SessionPhase::Sending
        } else if self.resumed {
            SessionPhase::Resumed
        } else {
            SessionPhase::Idle
        }
    }

    /// Remove the oldest pending tool with this name. Denied markers stay.
    pub fn resolve_pending_tool(&mut self, tool_name: &str) -> Option<PendingTool> {
        let idx = self
            .pending_tools
            .iter()
            .position(|t| !t.denied && t.tool_name == tool_name)?;
        Some(self.pending_tools.remove(idx))
    }

    pub fn clear_allowed_tools(&mut self) {
        self.pending_tools.retain(|t| t.denied);
    }

    pub fn push_pty_text(&mut self, text: &str) {
        for line in text.lines() {
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            if self.pty_lines.len() == PTY_HISTORY_LINES {
                self.pty_lines.pop_front();
            }
            self.pty_lines.push_back(line.to_string());
            self.pty_lines_total += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Error,
}

/// Transient status text
#[derive(Debug, Clone)]
pub struct StatusFlash {
    pub text: String,
    pub level: StatusLevel,
    pub expires_at: Instant,
}
