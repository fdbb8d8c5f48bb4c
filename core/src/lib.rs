//! herald-core: task execution runtime for a conversational agent
//!
//! Receives tasks, forwards them to a chat-completion service and returns
//! structured response events, with per-conversation sessions and
//! cooperative cancellation.

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod protocol;
pub mod util;

// Re-exports for convenience
pub use agent::runtime::AgentRuntime;
pub use config::HeraldConfig;
pub use error::{HeraldError, Result};
pub use llm::{LlmClient, LlmConfig, LlmProvider};
pub use protocol::{Message, Part, Role, Task};
