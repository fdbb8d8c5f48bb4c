//! Capability traits
//!
//! Base trait + specialized async capability traits.
//! No decision logic. Pure side-effect execution.

use crate::agent::runtime::context::RuntimeContext;
use crate::agent::runtime::error::{LlmError, ToolError};
use crate::llm::chat::{ChatMessage, ToolCall, ToolDefinition, Usage};
use std::sync::Arc;

/// Base capability trait for identity
pub trait Capability: Send + Sync {
    fn name(&self) -> &'static str;
}

/// Result of one chat completion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatCompletionOutput {
    /// Final assistant text, `None` when the model produced nothing
    pub text: Option<String>,
    pub usage: Usage,
}

impl ChatCompletionOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            usage: Usage::default(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Chat-completion capability - the model service
///
/// Implementations must return [`LlmError::Cancelled`] instead of a result
/// once `ctx.cancellation` fires.
#[async_trait::async_trait]
pub trait ChatCompletion: Capability {
    async fn complete(
        &self,
        ctx: &RuntimeContext,
        history: &[ChatMessage],
        tools: Option<Arc<dyn ToolCapability>>,
    ) -> Result<ChatCompletionOutput, LlmError>;
}

/// Outcome of a tool call, fed back to the model either way
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Success { output: String },
    Error { message: String, retryable: bool },
}

impl ToolOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self::Success {
            output: output.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            retryable: false,
        }
    }

    /// Text handed to the model as the tool message content
    pub fn into_content(self) -> String {
        match self {
            Self::Success { output } => output,
            Self::Error { message, .. } => format!("ERROR: {}", message),
        }
    }
}

/// Tool capability - tool execution
#[async_trait::async_trait]
pub trait ToolCapability: Capability {
    /// Tools advertised to the model
    fn definitions(&self) -> Vec<ToolDefinition>;

    async fn execute(&self, ctx: &RuntimeContext, call: &ToolCall) -> Result<ToolOutput, ToolError>;
}
