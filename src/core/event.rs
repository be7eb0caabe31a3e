use std::path::PathBuf;

use crate::agent::{PermissionDecision, ProtocolEvent};
use crate::history::{LogReader, Record};
use crate::hooks::HookEnvelope;
use crate::pty::OutputChunk;
use crate::session::Session;

/// Messages applied by the scheduler, one at a time
#[derive(Debug)]
pub enum AppEvent {
    /// Session discovery finished
    SessionsLoaded {
        result: Result<Vec<Session>, String>,
    },

    /// A log read finished; the reader comes back with its advanced offset
    RecordsLoaded {
        session_id: String,
        generation: u64,
        reader: LogReader,
        full: bool,
        result: Result<Vec<Record>, String>,
    },

    /// The session's log was written (debounced)
    FileChanged { session_id: String },

    /// A session directory appeared or disappeared
    SessionSetChanged,

    /// Envelope from the hook socket
    Hook(HookEnvelope),

    /// Event from the session protocol
    Protocol(ProtocolEvent),

    /// Show this session's conversation
    SelectSession(String),

    /// User wants to send a message
    SendRequested { session_id: String, text: String },

    /// The protocol attached to the session
    SessionResumed { session_id: String },

    /// The send command completed (the reply arrives later)
    SendFinished {
        session_id: String,
        result: Result<String, String>,
    },

    /// User wants to stop the session's current work
    AbortRequested { session_id: String },

    /// User decided the oldest parked permission request
    PermissionDecided {
        session_id: String,
        decision: PermissionDecision,
    },

    /// User answered the oldest parked question
    UserInputAnswered { session_id: String, answer: String },

    /// The interactive subprocess is running
    PtyStarted { session_id: String },

    /// Output from the interactive subprocess
    PtyOutput {
        session_id: String,
        chunk: OutputChunk,
    },

    /// User picked an option of the detected approval prompt
    ApprovalSelected { session_id: String, shortcut: String },

    /// The interactive subprocess is gone
    PtyExited {
        session_id: String,
        error: Option<String>,
    },

    /// A side effect failed in a way worth showing
    EffectFailed {
        session_id: Option<String>,
        error: String,
    },

    /// User wants to change the session's summary
    RenameRequested { session_id: String, summary: String },

    RenameFinished {
        session_id: String,
        result: Result<(), String>,
    },

    ExportRequested,

    ExportFinished { result: Result<PathBuf, String> },

    /// Periodic housekeeping and rescan
    Tick,

    /// Rescan everything now
    Refresh,

    Quit,
}
