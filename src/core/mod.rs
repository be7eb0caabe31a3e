//! Event coordination: the scheduler state machine and the runtime that feeds it
//!
//! - [`App`] applies [`AppEvent`]s one at a time and returns [`Effect`]s
//! - [`Runtime`] fans producers into one queue and executes effects

mod effect;
mod event;
pub mod export;
mod runtime;
mod scheduler;
mod state;

pub use effect::Effect;
pub use event::AppEvent;
pub use runtime::{copilot_protocol, ProtocolFactory, Runtime};
pub use scheduler::App;
pub use state::{
    ParkedPermission, ParkedUserInput, PendingTool, SessionPhase, SessionState, StatusFlash,
    StatusLevel, PTY_HISTORY_LINES,
};
