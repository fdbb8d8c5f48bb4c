//! Session store
//!
//! One [`Session`] per context id, created lazily with the system
//! instruction as its first history entry.

use crate::llm::chat::ChatMessage;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Message history of one conversation
#[derive(Debug)]
pub struct Session {
    context_id: String,
    history: Mutex<Vec<ChatMessage>>,
    created_at: DateTime<Utc>,
    last_touched: Mutex<DateTime<Utc>>,
}

impl Session {
    fn new(context_id: &str, system_prompt: &str) -> Self {
        let now = Utc::now();
        Self {
            context_id: context_id.to_string(),
            history: Mutex::new(vec![ChatMessage::system(system_prompt)]),
            created_at: now,
            last_touched: Mutex::new(now),
        }
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    /// Copy of the full history, system instruction first
    pub fn history(&self) -> Vec<ChatMessage> {
        self.history.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.lock().is_empty()
    }

    /// Append a user turn and return the history to send to the model
    pub fn push_user(&self, text: impl Into<String>) -> Vec<ChatMessage> {
        let mut history = self.history.lock();
        history.push(ChatMessage::user(text));
        self.touch();
        history.clone()
    }

    pub fn push_assistant(&self, text: impl Into<String>) {
        self.history.lock().push(ChatMessage::assistant(text));
        self.touch();
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_touched(&self) -> DateTime<Utc> {
        *self.last_touched.lock()
    }

    fn touch(&self) {
        *self.last_touched.lock() = Utc::now();
    }
}

/// Concurrent map of sessions keyed by context id
pub struct SessionStore {
    sessions: DashMap<String, Arc<Session>>,
    system_prompt: String,
}

impl SessionStore {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            sessions: DashMap::new(),
            system_prompt: system_prompt.into(),
        }
    }

    /// Fetch the session for `context_id`, creating it on first use
    ///
    /// Concurrent callers with the same id observe a single creation.
    pub fn get_or_create(&self, context_id: &str) -> Arc<Session> {
        let entry = self
            .sessions
            .entry(context_id.to_string())
            .or_insert_with(|| {
                debug!(context_id = %context_id, "Creating new chat session");
                Arc::new(Session::new(context_id, &self.system_prompt))
            });
        Arc::clone(entry.value())
    }

    pub fn get(&self, context_id: &str) -> Option<Arc<Session>> {
        self.sessions.get(context_id).map(|s| Arc::clone(s.value()))
    }

    pub fn contains(&self, context_id: &str) -> bool {
        self.sessions.contains_key(context_id)
    }

    /// Remove `context_id` only if `predicate` still holds under the map lock
    pub fn remove_if(&self, context_id: &str, predicate: impl FnOnce(&Session) -> bool) -> bool {
        self.sessions
            .remove_if(context_id, |_, session| predicate(session))
            .is_some()
    }

    pub fn context_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }
}
