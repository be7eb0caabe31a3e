//! Integration tests for the log pipeline
//!
//! Tests the flow: events.jsonl on disk -> LogReader -> reconcile -> Conversation,
//! plus discovery and change notification on a real session-state tree.

use std::io::Write;
use std::time::Duration;

use serde_json::json;

use icq::history::{reconcile, LogReader, Role, ToolCallStatus};
use icq::session::{SessionRepo, SessionSource};
use icq::watcher::{SessionWatcher, WatchEvent};

use super::common::*;

/// Appended records extend the conversation without re-reading the file
#[test]
fn test_incremental_read_matches_full_reconcile() {
    let root = TestSessionRoot::new();
    root.add_session("s1", "Build fixes");
    root.append(
        "s1",
        &[
            user_line("u1", "run the tests"),
            assistant_line(
                "a1",
                "Running them now",
                &[
                    ("tc1", "bash", json!({ "command": "cargo test" })),
                    ("tc2", "view", json!({ "path": "/work/s1/src/lib.rs" })),
                ],
            ),
        ],
    );

    let mut reader = LogReader::new(root.log_path("s1"));
    let first = reader.read_all().unwrap();
    assert_eq!(first.len(), 2);
    let mut conversation = reconcile(&first);
    assert_eq!(
        conversation.tool_call("tc1").unwrap().status,
        ToolCallStatus::Pending
    );

    root.append(
        "s1",
        &[
            tool_start_line("e1", "tc1", "bash"),
            tool_complete_line("e2", "tc1", false, "2 tests failed"),
            // Completion for a call no assistant message mentioned
            tool_complete_line("e3", "tc9", true, "ignored"),
        ],
    );
    let offset_before = reader.offset();
    let appended = reader.read_new().unwrap();
    assert_eq!(appended.len(), 3);
    assert!(reader.offset() > offset_before);
    conversation.extend(&appended);

    let tc1 = conversation.tool_call("tc1").unwrap();
    assert_eq!(tc1.status, ToolCallStatus::Failed);
    assert_eq!(tc1.summary, "2 tests failed");
    assert_eq!(
        conversation.tool_call("tc2").unwrap().status,
        ToolCallStatus::Pending
    );
    assert!(conversation.tool_call("tc9").is_none());
    assert_eq!(conversation.len(), 2);

    // Nothing new: nothing returned, offset unchanged
    let offset = reader.offset();
    assert!(reader.read_new().unwrap().is_empty());
    assert_eq!(reader.offset(), offset);

    let mut fresh = LogReader::new(root.log_path("s1"));
    let rebuilt = reconcile(&fresh.read_all().unwrap());
    assert_eq!(rebuilt.turns(), conversation.turns());
}

/// A partially written trailing line is picked up once it is completed
#[test]
fn test_partial_line_waits_for_completion() {
    let root = TestSessionRoot::new();
    root.add_session("s1", "Partial");
    root.append("s1", &[user_line("u1", "first")]);

    let full = user_line("u2", "second");
    let (head, tail) = full.split_at(full.len() / 2);
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(root.log_path("s1"))
        .unwrap();
    file.write_all(head.as_bytes()).unwrap();
    file.flush().unwrap();

    let mut reader = LogReader::new(root.log_path("s1"));
    assert_eq!(reader.read_all().unwrap().len(), 1);

    writeln!(file, "{tail}").unwrap();
    file.flush().unwrap();

    let records = reader.read_new().unwrap();
    assert_eq!(records.len(), 1);
    let conversation = reconcile(&records);
    assert_eq!(conversation.turns()[0].role, Role::User);
    assert_eq!(conversation.turns()[0].content, "second");
}

/// Malformed lines are skipped without stopping the read
#[test]
fn test_malformed_lines_are_skipped() {
    let root = TestSessionRoot::new();
    root.add_session("s1", "Noise");
    root.append(
        "s1",
        &[
            user_line("u1", "hello"),
            "{not json".to_string(),
            String::new(),
            assistant_line("a1", "hi", &[]),
        ],
    );

    let mut reader = LogReader::new(root.log_path("s1"));
    let conversation = reconcile(&reader.read_all().unwrap());
    let roles: Vec<_> = conversation.turns().iter().map(|t| t.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant]);
}

#[test]
fn test_repo_lists_sessions_and_log_paths() {
    let root = TestSessionRoot::new();
    root.add_session("alpha", "First");
    root.add_session("beta", "Second");

    let repo = SessionRepo::new(&root.path);
    let mut ids: Vec<_> = repo.list().unwrap().into_iter().map(|s| s.id).collect();
    ids.sort();
    assert_eq!(ids, vec!["alpha", "beta"]);
    assert_eq!(repo.log_path("alpha"), root.log_path("alpha"));
}

/// Writes to a watched session's log surface as a FileChanged notification
#[tokio::test]
async fn test_watcher_reports_log_writes() {
    let root = TestSessionRoot::new();
    root.add_session("s1", "Watched");
    root.append("s1", &[user_line("u1", "hello")]);

    let (watcher, mut rx) = SessionWatcher::start(&root.path).unwrap();
    watcher.watch_session("s1").unwrap();

    root.append("s1", &[assistant_line("a1", "hi", &[])]);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let mut seen = false;
    while let Ok(Some(event)) = tokio::time::timeout_at(deadline, rx.recv()).await {
        if let WatchEvent::FileChanged { session_id, .. } = event {
            assert_eq!(session_id, "s1");
            seen = true;
            break;
        }
    }
    assert!(seen, "expected a FileChanged notification for s1");

    watcher.close();
}
