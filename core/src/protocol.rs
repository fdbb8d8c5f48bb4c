//! Task and message data model exchanged with the outer transport
//!
//! A [`Task`] is one request/response exchange. Its input [`Message`] is a
//! sequence of typed [`Part`]s; only text parts are consumed by the runtime.

use serde::{Deserialize, Serialize};

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

/// File reference carried by a file part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// One typed piece of message content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Part {
    Text { text: String },
    File { file: FileContent },
    Data { data: serde_json::Value },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    /// Text of a text part, `None` for every other kind
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Message {
    /// Build a user message holding a single text part
    pub fn user_text(message_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            context_id: None,
            task_id: None,
            role: Role::User,
            parts: vec![Part::text(text)],
        }
    }

    /// Concatenated text of every text part, joined by newlines
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A unit of work submitted by the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
}

impl Task {
    pub fn new(message: Message) -> Self {
        Self {
            id: None,
            context_id: None,
            message: Some(message),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_context_id(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }

    /// Identifier of the input message, if the caller supplied one
    pub fn message_id(&self) -> Option<&str> {
        self.message
            .as_ref()
            .map(|m| m.message_id.as_str())
            .filter(|id| !id.is_empty())
    }

    pub fn parts(&self) -> &[Part] {
        self.message.as_ref().map(|m| m.parts.as_slice()).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_wire_format() {
        let part = Part::text("hi");
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "text", "text": "hi"}));
    }

    #[test]
    fn test_task_from_json() {
        let raw = r#"{
            "id": "t1",
            "contextId": "c1",
            "message": {
                "messageId": "m1",
                "role": "user",
                "parts": [
                    {"kind": "text", "text": "What's the weather?"},
                    {"kind": "data", "data": {"units": "metric"}}
                ]
            }
        }"#;
        let task: Task = serde_json::from_str(raw).unwrap();
        assert_eq!(task.id.as_deref(), Some("t1"));
        assert_eq!(task.context_id.as_deref(), Some("c1"));
        assert_eq!(task.message_id(), Some("m1"));
        assert_eq!(task.parts().len(), 2);
        assert_eq!(task.parts()[0].as_text(), Some("What's the weather?"));
        assert_eq!(task.parts()[1].as_text(), None);
    }

    #[test]
    fn test_empty_message_id_is_absent() {
        let task = Task::new(Message::user_text("", "hello"));
        assert_eq!(task.message_id(), None);
        assert!(Task::default().parts().is_empty());
    }
}
