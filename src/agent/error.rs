use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Agent binary not found: {0}")]
    BinaryNotFound(String),

    #[error("Failed to spawn agent process")]
    ProcessSpawnFailed,

    #[error("Failed to capture agent stdio")]
    StdioCaptureFailed,

    #[error("Session {0} has not been resumed")]
    NotResumed(String),

    #[error("Protocol connection closed")]
    Disconnected,

    #[error("Protocol error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Unexpected protocol response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
