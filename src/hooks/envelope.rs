use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle points reported by the companion hook process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HookEventKind {
    SessionStart,
    SessionEnd,
    UserPromptSubmitted,
    PreToolUse,
    PostToolUse,
    ErrorOccurred,
    #[serde(other)]
    Other,
}

/// One line on the hook socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookEnvelope {
    pub event: HookEventKind,
    pub session_id: String,
    #[serde(default)]
    pub cwd: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data: Value,
}

/// Payload of `preToolUse` / `postToolUse`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUseData {
    #[serde(default)]
    pub tool_name: String,
    #[serde(default)]
    pub tool_args: Value,
    #[serde(default)]
    pub tool_result: Option<Value>,
}

impl HookEnvelope {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    pub fn tool_use(&self) -> Option<ToolUseData> {
        match self.event {
            HookEventKind::PreToolUse | HookEventKind::PostToolUse => {
                serde_json::from_value(self.data.clone()).ok()
            }
            _ => None,
        }
    }

    /// Tool arguments rendered as a single string for display and policy matching
    pub fn tool_args_text(&self) -> String {
        match self.tool_use().map(|t| t.tool_args) {
            Some(Value::String(s)) => s,
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }

    pub fn error_message(&self) -> Option<String> {
        if self.event != HookEventKind::ErrorOccurred {
            return None;
        }
        self.data
            .get("error")
            .and_then(|e| e.get("message").or(Some(e)))
            .and_then(Value::as_str)
            .or_else(|| self.data.get("message").and_then(Value::as_str))
            .map(str::to_string)
    }
}
