//! Session-state test fixtures
//!
//! Builds a temporary directory laid out like the Copilot CLI's
//! session state so discovery, log reading and watching can be tested
//! against real files.

#![allow(dead_code)]

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;

/// A temporary session-state root
///
/// # Example
/// ```
/// let root = TestSessionRoot::new();
/// root.add_session("s1", "Fix the build");
/// root.append("s1", &[user_line("u1", "hello")]);
/// ```
pub struct TestSessionRoot {
    _dir: TempDir,
    pub path: PathBuf,
}

impl TestSessionRoot {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().to_path_buf();
        Self { _dir: dir, path }
    }

    pub fn session_dir(&self, id: &str) -> PathBuf {
        self.path.join(id)
    }

    pub fn log_path(&self, id: &str) -> PathBuf {
        self.session_dir(id).join("events.jsonl")
    }

    /// Create `<root>/<id>/workspace.yaml`
    pub fn add_session(&self, id: &str, summary: &str) -> PathBuf {
        let dir = self.session_dir(id);
        fs::create_dir_all(&dir).expect("Failed to create session dir");
        fs::write(
            dir.join("workspace.yaml"),
            format!(
                "id: {id}\ncwd: /work/{id}\nsummary: {summary}\nsummary_count: 1\ncreated_at: 2025-01-01T00:00:00Z\nupdated_at: 2025-01-01T00:00:00Z\n"
            ),
        )
        .expect("Failed to write workspace.yaml");
        dir
    }

    /// Append lines to the session's log, each terminated by a newline
    pub fn append(&self, id: &str, lines: &[String]) {
        append_lines(&self.log_path(id), lines);
    }
}

impl Default for TestSessionRoot {
    fn default() -> Self {
        Self::new()
    }
}

pub fn append_lines(path: &Path, lines: &[String]) {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .expect("Failed to open log");
    for line in lines {
        writeln!(file, "{line}").expect("Failed to append log line");
    }
}

fn record(kind: &str, id: &str, data: Value) -> String {
    json!({
        "type": kind,
        "id": id,
        "timestamp": "2025-01-01T00:00:00Z",
        "data": data,
    })
    .to_string()
}

pub fn user_line(id: &str, content: &str) -> String {
    record("user.message", id, json!({ "content": content }))
}

pub fn assistant_line(id: &str, content: &str, tools: &[(&str, &str, Value)]) -> String {
    let requests: Vec<Value> = tools
        .iter()
        .map(|(call_id, name, args)| {
            json!({ "toolCallId": call_id, "name": name, "arguments": args, "type": "function" })
        })
        .collect();
    record(
        "assistant.message",
        id,
        json!({ "messageId": id, "content": content, "toolRequests": requests }),
    )
}

pub fn tool_start_line(id: &str, call_id: &str, name: &str) -> String {
    record(
        "tool.execution_start",
        id,
        json!({ "toolCallId": call_id, "toolName": name }),
    )
}

pub fn tool_complete_line(id: &str, call_id: &str, success: bool, content: &str) -> String {
    record(
        "tool.execution_complete",
        id,
        json!({ "toolCallId": call_id, "success": success, "result": { "content": content } }),
    )
}

/// Poll `check` until it holds or `timeout` passes.
pub async fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
