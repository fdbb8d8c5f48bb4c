//! Runtime errors

use crate::error::HeraldError;
use thiserror::Error;

/// Chat-completion capability error
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    /// The call observed its cancellation token
    #[error("LLM call cancelled")]
    Cancelled,

    /// Any other failure reported by the model service
    #[error("{message}")]
    Upstream { message: String },
}

impl LlmError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self::Upstream {
            message: msg.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<HeraldError> for LlmError {
    fn from(e: HeraldError) -> Self {
        match e {
            HeraldError::Cancelled => Self::Cancelled,
            other => Self::new(other.user_message()),
        }
    }
}

/// Tool capability error
#[derive(Debug, Clone, Error)]
#[error("Tool error: {message}")]
pub struct ToolError {
    pub message: String,
}

impl ToolError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

/// Why an execution ended without a Message event
///
/// The `Display` text is the reason carried by the Error event.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    #[error("No valid message content found")]
    EmptyInput,

    #[error("No response generated")]
    NoResponse,

    #[error("Task {task_id} is already in progress")]
    DuplicateTask { task_id: String },

    #[error("An error occurred: {0}")]
    Llm(LlmError),

    #[error("An error occurred: {0}")]
    Panicked(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl From<LlmError> for RuntimeError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Cancelled => RuntimeError::Cancelled,
            other => RuntimeError::Llm(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_text() {
        assert_eq!(RuntimeError::EmptyInput.to_string(), "No valid message content found");
        assert_eq!(RuntimeError::NoResponse.to_string(), "No response generated");
        assert_eq!(
            RuntimeError::from(LlmError::new("quota exhausted")).to_string(),
            "An error occurred: quota exhausted"
        );
        assert_eq!(
            RuntimeError::DuplicateTask {
                task_id: "t1".to_string()
            }
            .to_string(),
            "Task t1 is already in progress"
        );
    }

    #[test]
    fn test_cancellation_is_preserved() {
        assert!(LlmError::from(HeraldError::Cancelled).is_cancelled());
        assert!(matches!(
            RuntimeError::from(LlmError::Cancelled),
            RuntimeError::Cancelled
        ));
        assert!(!LlmError::from(HeraldError::ServiceUnavailable { retry_after: None }).is_cancelled());
    }
}
