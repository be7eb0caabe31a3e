//! Integration tests for copilot-icq
//!
//! These tests verify that multiple components work together correctly.

#[path = "../common/mod.rs"]
pub mod common;

pub mod hook_ingestion;
pub mod log_pipeline;
pub mod protocol_adapter;
pub mod scheduler_flow;
