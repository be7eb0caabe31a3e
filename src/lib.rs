pub mod agent;
pub mod alerts;
pub mod config;
pub mod console;
pub mod core;
pub mod history;
pub mod hooks;
pub mod pty;
pub mod session;
pub mod util;
pub mod watcher;

pub use agent::{AgentError, CopilotAdapter, ProtocolEvent, ProtocolEventKind, SessionProtocol};
pub use config::Config;
pub use core::{App, AppEvent, Effect, Runtime};
pub use history::{reconcile, Conversation, ConversationTurn, LogReader, Record, ToolCall};
pub use hooks::{HookEnvelope, HookServer};
pub use pty::{ApprovalPrompt, PromptParser, PtySession};
pub use session::{Session, SessionRepo, SessionSource};
pub use watcher::{SessionWatcher, WatchEvent};
