pub mod copilot;
pub mod error;
pub mod events;
pub mod mock;
pub mod protocol;

pub use copilot::CopilotAdapter;
pub use error::AgentError;
pub use events::*;
pub use protocol::{ProtocolConfig, SessionProtocol};
