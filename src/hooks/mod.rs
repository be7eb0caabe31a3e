//! Hook ingestion over a local Unix-domain socket
//!
//! The companion hook binary connects once per lifecycle event and writes
//! one or more newline-delimited JSON envelopes. Delivery is best-effort:
//! malformed lines are skipped and a full queue drops new envelopes.

mod envelope;
mod server;

use std::path::PathBuf;

use thiserror::Error;

pub use envelope::{HookEnvelope, HookEventKind, ToolUseData};
pub use server::{HookServer, MAX_LINE_BYTES, QUEUE_CAPACITY};

/// Environment variable overriding the socket location
pub const SOCKET_ENV: &str = "COPILOT_ICQ_SOCKET";

#[derive(Error, Debug)]
pub enum HookError {
    #[error("failed to bind hook socket at {}: {source}", path.display())]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Socket path from `COPILOT_ICQ_SOCKET`, else `~/.copilot/copilot-icq.sock`.
pub fn default_socket_path() -> PathBuf {
    if let Some(path) = std::env::var_os(SOCKET_ENV).filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    dirs::home_dir()
        .map(|h| h.join(".copilot"))
        .unwrap_or_else(|| PathBuf::from(".copilot"))
        .join("copilot-icq.sock")
}
