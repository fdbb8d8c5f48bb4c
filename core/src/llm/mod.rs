//! LLM client module
//!
//! Provides interfaces for communicating with chat-completion providers:
//! - OpenAI-compatible API (OpenAI, Ollama, OpenRouter, local models)
//! - Google Generative AI (Gemini)

pub mod chat;
pub mod client;
#[cfg(test)]
pub(crate) mod stub;

pub use chat::{
    ChatMessage, ChatRequest, ChatResponse, Choice, MessageRole, ToolCall, ToolCallFunction,
    ToolDefinition, Usage,
};
pub use client::{LlmClient, LlmProvider};

/// LLM Configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Provider type
    pub provider: LlmProvider,
    /// API endpoint base URL
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// API key (if required)
    pub api_key: Option<String>,
    /// Maximum tokens in response
    pub max_tokens: Option<u32>,
    /// Temperature for sampling (0.0 - 2.0)
    pub temperature: Option<f32>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl LlmConfig {
    /// Create a new LLM config
    pub fn new(
        provider: LlmProvider,
        base_url: String,
        model: String,
        api_key: Option<String>,
    ) -> Self {
        LlmConfig {
            provider,
            base_url,
            model,
            api_key,
            max_tokens: Some(1000),
            temperature: Some(0.7),
            timeout_secs: 30,
        }
    }

    /// Set maximum tokens
    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    /// Set temperature
    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp.clamp(0.0, 2.0));
        self
    }

    /// Set the per-request timeout
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}
