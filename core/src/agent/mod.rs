//! Agent task execution
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  RUNTIME          Task execution (async, side effects)      │
//! │  - AgentRuntime: execute / cancel_task / sweep_sessions     │
//! │  - TaskRegistry: live task id -> cancellation controller    │
//! │  - ResponseSynthesizer: Message / Error / Cancelled events  │
//! │  - Capability traits: ChatCompletion, ToolCapability        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SESSION          Conversation state                        │
//! │  - SessionStore: context id -> history                      │
//! │  - SessionJanitor: evicts unused sessions                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use herald_core::agent::runtime::{AgentRuntime, impls::{LlmClientCapability, ToolRegistry}};
//! use herald_core::protocol::{Message, Task};
//!
//! let runtime = AgentRuntime::new(Arc::new(LlmClientCapability::new(client)), system_prompt)
//!     .with_tools(Arc::new(ToolRegistry::with_defaults()));
//!
//! let task = Task::new(Message::user_text("m1", "Top headlines?")).with_context_id("c1");
//! let mut events = runtime.execute(task, CancellationToken::new());
//! while let Some(event) = events.next().await {
//!     println!("{}", event.text());
//! }
//! ```

pub mod runtime;
pub mod session;


pub use runtime::{
    AgentRuntime, ChatCompletion, ChatCompletionOutput, ResponseEvent, ResponseKind,
    RuntimeContext, ToolCapability, ToolOutput,
};
pub use session::{Session, SessionJanitor, SessionStore};
