//! Interactive subprocess proxy and approval-prompt detection

pub mod prompt;
mod session;

use thiserror::Error;

pub use prompt::{strip_ansi, ApprovalOption, ApprovalPrompt, OutputChunk, PromptParser};
pub use session::{PtyExit, PtyOutput, PtySession, PtySpawnConfig, READ_BUFFER_SIZE};

#[derive(Error, Debug)]
pub enum PtyError {
    #[error("failed to open pseudo-terminal: {0}")]
    Open(String),

    #[error("failed to spawn {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("pty session is closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
