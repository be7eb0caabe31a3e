//! Folding raw log records into display-ready conversation turns
//!
//! Turns live in one growable `Vec`; every tool call is addressed by a
//! [`ToolSlot`] (turn index, tool index) stored in a lookup table keyed
//! by the agent's tool-call id. Later lifecycle records mutate the tool
//! call through that table, so the update is visible at the turn that
//! declared it without rescanning.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::{
    AssistantMessageData, Record, RecordKind, SessionInfoData, ToolExecutionData, UserMessageData,
};
use super::tools::{extract_detail, ToolDetail};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::System => "System",
            Role::Tool => "Tool",
        }
    }
}

/// Lifecycle of a tool call. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    Pending,
    Running,
    Complete,
    Failed,
}

impl ToolCallStatus {
    fn rank(self) -> u8 {
        match self {
            ToolCallStatus::Pending => 0,
            ToolCallStatus::Running => 1,
            ToolCallStatus::Complete | ToolCallStatus::Failed => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rank() == 2
    }

    pub fn can_advance_to(self, next: ToolCallStatus) -> bool {
        next.rank() > self.rank()
    }

    pub fn glyph(self) -> &'static str {
        match self {
            ToolCallStatus::Pending => "○",
            ToolCallStatus::Running => "◐",
            ToolCallStatus::Complete => "✓",
            ToolCallStatus::Failed => "✗",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub status: ToolCallStatus,
    pub summary: String,
    pub detail: ToolDetail,
}

impl ToolCall {
    /// Move to `next` if that is a forward transition. Returns whether the status changed.
    pub fn advance(&mut self, next: ToolCallStatus) -> bool {
        if self.status.can_advance_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub tool_calls: Vec<ToolCall>,
}

/// Location of a tool call inside [`Conversation::turns`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSlot {
    pub turn: usize,
    pub tool: usize,
}

/// Reconciled conversation for one session
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
    tool_index: HashMap<String, ToolSlot>,
}

/// Fold `records` into a fresh conversation.
pub fn reconcile(records: &[Record]) -> Conversation {
    let mut conversation = Conversation::default();
    conversation.extend(records);
    conversation
}

impl Conversation {
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn tool_call(&self, id: &str) -> Option<&ToolCall> {
        let slot = self.tool_index.get(id)?;
        self.turns.get(slot.turn)?.tool_calls.get(slot.tool)
    }

    pub fn tool_call_mut(&mut self, id: &str) -> Option<&mut ToolCall> {
        let slot = *self.tool_index.get(id)?;
        self.turns.get_mut(slot.turn)?.tool_calls.get_mut(slot.tool)
    }

    pub fn slot(&self, id: &str) -> Option<ToolSlot> {
        self.tool_index.get(id).copied()
    }

    /// Fold further records onto the existing state.
    pub fn extend<'a>(&mut self, records: impl IntoIterator<Item = &'a Record>) {
        for record in records {
            self.apply(record);
        }
    }

    pub fn apply(&mut self, record: &Record) {
        match record.kind {
            RecordKind::UserMessage => {
                let data: UserMessageData = record.payload().unwrap_or_default();
                let content = if data.content.is_empty() {
                    data.transformed_content
                } else {
                    data.content
                };
                self.push_turn(ConversationTurn {
                    role: Role::User,
                    content,
                    timestamp: record.timestamp,
                    tool_calls: Vec::new(),
                });
            }
            RecordKind::AssistantMessage => {
                let Some(data) = record.payload::<AssistantMessageData>() else {
                    return;
                };
                self.push_assistant(data, record.timestamp);
            }
            RecordKind::ToolExecutionStart => {
                if let Some(data) = record.payload::<ToolExecutionData>() {
                    self.mark_running(&data.tool_call_id);
                }
            }
            RecordKind::ToolExecutionComplete => {
                if let Some(data) = record.payload::<ToolExecutionData>() {
                    let summary = data.summary();
                    self.mark_finished(&data.tool_call_id, data.success, summary);
                }
            }
            RecordKind::SessionInfo => {
                let data: SessionInfoData = record.payload().unwrap_or_default();
                if data.message.trim().is_empty() {
                    return;
                }
                self.push_turn(ConversationTurn {
                    role: Role::System,
                    content: data.message,
                    timestamp: record.timestamp,
                    tool_calls: Vec::new(),
                });
            }
            RecordKind::SessionStart
            | RecordKind::AssistantTurnStart
            | RecordKind::AssistantTurnEnd
            | RecordKind::Unknown => {}
        }
    }

    /// Transition a tool call to `running`. Unknown ids are ignored.
    pub fn mark_running(&mut self, id: &str) -> bool {
        match self.tool_call_mut(id) {
            Some(call) => call.advance(ToolCallStatus::Running),
            None => {
                tracing::trace!(tool_call_id = %id, "Start for unknown tool call");
                false
            }
        }
    }

    /// Transition a tool call to `complete`/`failed` and record its summary.
    pub fn mark_finished(&mut self, id: &str, success: bool, summary: String) -> bool {
        let next = if success {
            ToolCallStatus::Complete
        } else {
            ToolCallStatus::Failed
        };
        match self.tool_call_mut(id) {
            Some(call) => {
                if call.advance(next) {
                    call.summary = summary;
                    true
                } else {
                    false
                }
            }
            None => {
                tracing::trace!(tool_call_id = %id, "Completion for unknown tool call");
                false
            }
        }
    }

    fn push_assistant(&mut self, data: AssistantMessageData, timestamp: Option<DateTime<Utc>>) {
        if data.content.is_empty() && data.tool_requests.is_empty() {
            return;
        }

        let turn = self.turns.len();
        let mut tool_calls = Vec::with_capacity(data.tool_requests.len());
        for request in data.tool_requests {
            let slot = ToolSlot {
                turn,
                tool: tool_calls.len(),
            };
            self.tool_index.insert(request.tool_call_id.clone(), slot);
            tool_calls.push(ToolCall {
                detail: extract_detail(&request.name, &request.arguments),
                id: request.tool_call_id,
                name: request.name,
                status: ToolCallStatus::Pending,
                summary: String::new(),
            });
        }

        self.push_turn(ConversationTurn {
            role: Role::Assistant,
            content: data.content,
            timestamp,
            tool_calls,
        });
    }

    fn push_turn(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }
}
