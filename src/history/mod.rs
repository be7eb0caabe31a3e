//! Session log ingestion: raw records, the incremental reader and the reconciler

mod conversation;
mod reader;
mod record;
mod tools;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use conversation::{
    reconcile, Conversation, ConversationTurn, Role, ToolCall, ToolCallStatus, ToolSlot,
};
pub use reader::LogReader;
pub use record::{
    AssistantMessageData, Record, RecordKind, SessionInfoData, ToolExecutionData, ToolRequest,
    UserMessageData,
};
pub use tools::{extract_detail, ToolDetail};

/// Canonical log filename inside a session directory
pub const EVENTS_FILE: &str = "events.jsonl";

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HistoryError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        HistoryError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
