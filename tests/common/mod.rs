//! Shared test utilities for copilot-icq
//!
//! - On-disk session-state trees (workspace.yaml + events.jsonl)
//! - Record line builders
//! - Polling helper for asynchronous assertions

pub mod session_fixtures;

pub use session_fixtures::*;
