use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type tag of a session log record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    #[serde(rename = "session.start")]
    SessionStart,
    #[serde(rename = "session.info")]
    SessionInfo,
    #[serde(rename = "user.message")]
    UserMessage,
    #[serde(rename = "assistant.message")]
    AssistantMessage,
    #[serde(rename = "assistant.turn_start")]
    AssistantTurnStart,
    #[serde(rename = "assistant.turn_end")]
    AssistantTurnEnd,
    #[serde(rename = "tool.execution_start")]
    ToolExecutionStart,
    #[serde(rename = "tool.execution_complete")]
    ToolExecutionComplete,
    /// Any type this build does not understand (kept for forward compatibility)
    #[serde(other)]
    Unknown,
}

/// One immutable line of a session's `events.jsonl`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "type")]
    pub kind: RecordKind,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, rename = "parentId")]
    pub parent_id: Option<String>,
}

impl Record {
    /// Decode the payload as `T`, returning `None` when the shape does not match.
    pub fn payload<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        match serde_json::from_value(self.data.clone()) {
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::trace!(id = %self.id, kind = ?self.kind, error = %e, "Record payload did not decode");
                None
            }
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMessageData {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub transformed_content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantMessageData {
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tool_requests: Vec<ToolRequest>,
}

/// A tool invocation declared by an assistant message
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolRequest {
    pub tool_call_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
    #[serde(default, rename = "type")]
    pub request_type: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolExecutionData {
    pub tool_call_id: String,
    #[serde(default)]
    pub tool_name: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub result: Option<ToolResult>,
    #[serde(default)]
    pub error: Option<ToolFailure>,
}

impl ToolExecutionData {
    /// Result text, else error text; a failed call never comes back empty.
    pub fn summary(&self) -> String {
        let from_result = self.result.as_ref().and_then(|r| {
            [&r.content, &r.detailed_content]
                .into_iter()
                .find(|s| !s.trim().is_empty())
                .cloned()
        });
        let from_error = self
            .error
            .as_ref()
            .map(|e| e.message.clone())
            .filter(|m| !m.trim().is_empty());

        match from_result.or(from_error) {
            Some(summary) => summary,
            None if !self.success => "failed".to_string(),
            None => String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub detailed_content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolFailure {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfoData {
    #[serde(default)]
    pub info_type: String,
    #[serde(default)]
    pub message: String,
}
