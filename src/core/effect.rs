use std::path::PathBuf;

use crate::alerts::Notification;
use crate::history::LogReader;
use crate::pty::PtySpawnConfig;

/// Side effects that should be executed outside the scheduler.
#[derive(Debug)]
pub enum Effect {
    /// List sessions from the discovery source
    LoadSessions,
    WatchSession(String),
    UnwatchSession(String),
    /// Read the log; `full` rereads from the start
    ReadRecords {
        session_id: String,
        generation: u64,
        reader: LogReader,
        full: bool,
    },
    /// Send through the session protocol, resuming first when asked
    ProtocolSend {
        session_id: String,
        text: String,
        resume: bool,
    },
    ProtocolAbort {
        session_id: String,
    },
    /// Launch the interactive subprocess for a send
    SpawnPty {
        session_id: String,
        config: PtySpawnConfig,
    },
    WritePty {
        session_id: String,
        text: String,
    },
    ClosePty {
        session_id: String,
    },
    Notify(Notification),
    /// Rewrite the summary in the session's metadata
    RenameSession {
        session_id: String,
        summary: String,
    },
    Export {
        path: PathBuf,
        markdown: String,
    },
    Shutdown,
}
