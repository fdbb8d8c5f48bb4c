//! Response synthesizer
//!
//! Builds the terminal events of an execution. No side effects beyond
//! drawing a fresh message id when the task did not carry one.

use crate::agent::runtime::ids::IdGenerator;
use crate::protocol::{Message, Part, Role, Task};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Fixed text of every Cancelled event
pub const CANCELLED_TEXT: &str = "The request was cancelled.";

/// Discriminates the terminal outcome of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    Message,
    Error,
    Cancelled,
}

/// One event emitted to the outer transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEvent {
    pub kind: ResponseKind,
    pub message: Message,
}

impl ResponseEvent {
    pub fn is_message(&self) -> bool {
        self.kind == ResponseKind::Message
    }

    pub fn is_error(&self) -> bool {
        self.kind == ResponseKind::Error
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ResponseKind::Cancelled
    }

    pub fn context_id(&self) -> Option<&str> {
        self.message.context_id.as_deref()
    }

    pub fn text(&self) -> String {
        self.message.text()
    }
}

/// Builds Message / Error / Cancelled events for a task
#[derive(Clone)]
pub struct ResponseSynthesizer {
    ids: Arc<dyn IdGenerator>,
}

impl ResponseSynthesizer {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self { ids }
    }

    pub fn message(&self, task: &Task, text: impl Into<String>) -> ResponseEvent {
        self.build(task, ResponseKind::Message, text.into())
    }

    pub fn error(&self, task: &Task, reason: impl std::fmt::Display) -> ResponseEvent {
        self.build(task, ResponseKind::Error, format!("Error: {}", reason))
    }

    pub fn cancelled(&self, task: &Task) -> ResponseEvent {
        self.build(task, ResponseKind::Cancelled, CANCELLED_TEXT.to_string())
    }

    fn build(&self, task: &Task, kind: ResponseKind, text: String) -> ResponseEvent {
        let message_id = task
            .message_id()
            .map(str::to_string)
            .unwrap_or_else(|| self.ids.generate());

        ResponseEvent {
            kind,
            message: Message {
                message_id,
                context_id: task.context_id.clone(),
                task_id: task.id.clone(),
                role: Role::Agent,
                parts: vec![Part::text(text)],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::runtime::ids::tests::SequentialIds;

    fn synthesizer() -> ResponseSynthesizer {
        ResponseSynthesizer::new(Arc::new(SequentialIds::default()))
    }

    #[test]
    fn test_message_keeps_input_message_id() {
        let task = Task::new(Message::user_text("m1", "hi"))
            .with_id("t1")
            .with_context_id("c1");

        let event = synthesizer().message(&task, "hello");
        assert!(event.is_message());
        assert_eq!(event.message.message_id, "m1");
        assert_eq!(event.context_id(), Some("c1"));
        assert_eq!(event.message.task_id.as_deref(), Some("t1"));
        assert_eq!(event.message.role, Role::Agent);
        assert_eq!(event.text(), "hello");
    }

    #[test]
    fn test_error_and_cancelled_text() {
        let task = Task::default().with_context_id("c1");
        let synth = synthesizer();

        let error = synth.error(&task, "No response generated");
        assert!(error.is_error());
        assert_eq!(error.text(), "Error: No response generated");
        assert_eq!(error.message.message_id, "gen-1");

        let cancelled = synth.cancelled(&task);
        assert!(cancelled.is_cancelled());
        assert_eq!(cancelled.text(), CANCELLED_TEXT);
        assert_eq!(cancelled.message.message_id, "gen-2");
        assert_eq!(cancelled.context_id(), Some("c1"));
    }

    #[test]
    fn test_event_wire_format() {
        let task = Task::new(Message::user_text("m1", "hi")).with_context_id("c1");
        let json = serde_json::to_value(synthesizer().cancelled(&task)).unwrap();
        assert_eq!(json["kind"], "cancelled");
        assert_eq!(json["message"]["contextId"], "c1");
        assert_eq!(json["message"]["role"], "agent");
        assert_eq!(json["message"]["parts"][0]["kind"], "text");
    }
}
