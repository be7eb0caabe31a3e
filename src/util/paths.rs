//! Path utilities for copilot-icq data directories

use std::path::PathBuf;
use std::sync::OnceLock;

/// Global storage for custom data directory path
static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Initialize the data directory with an optional custom path.
/// Must be called early in main() before any other path functions are used.
/// If custom_path is None, uses the default ~/.copilot-icq location.
pub fn init_data_dir(custom_path: Option<PathBuf>) {
    let path = custom_path.unwrap_or_else(default_data_dir);
    if DATA_DIR.set(path.clone()).is_err() {
        let existing = DATA_DIR
            .get()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        tracing::debug!(
            path = %path.display(),
            existing = %existing,
            "Data directory already initialized"
        );
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Get the default data directory path (~/.copilot-icq)
fn default_data_dir() -> PathBuf {
    home_dir().join(".copilot-icq")
}

/// Get the base data directory.
/// Returns the custom path if set via init_data_dir(), otherwise ~/.copilot-icq
pub fn data_dir() -> PathBuf {
    DATA_DIR.get().cloned().unwrap_or_else(default_data_dir)
}

/// Get the logs directory (~/.copilot-icq/logs)
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Get the default log file path (~/.copilot-icq/logs/copilot-icq.log)
pub fn log_file_path() -> PathBuf {
    logs_dir().join("copilot-icq.log")
}

/// Get the config file path (~/.copilot-icq/config.toml)
pub fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}

/// Where the Copilot CLI keeps per-session state (~/.copilot/session-state)
pub fn default_session_state_dir() -> PathBuf {
    home_dir().join(".copilot").join("session-state")
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => home_dir().join(rest),
        None if path == "~" => home_dir(),
        None => PathBuf::from(path),
    }
}
