//! Capability Implementations
//!
//! Concrete implementations of runtime capability traits.
//!
//! - `LlmClientCapability`: chat completion over `LlmClient`, with the
//!   automatic tool-call loop
//! - `ToolRegistry`: closure-registered tools (built-in: `current_time`)

pub mod llm_client;
pub mod tool_registry;

pub use llm_client::{LlmClientCapability, DEFAULT_MAX_TOOL_ROUNDS};
pub use tool_registry::{ToolFn, ToolRegistry};
