//! LLM Client implementation
//!
//! Supports multiple LLM providers:
//! - OpenAI-compatible API (OpenAI, Ollama, OpenRouter, local models)
//! - Google Generative AI (Gemini)
//!
//! Every request takes a [`CancellationToken`]; cancellation aborts the
//! in-flight HTTP call and any pending retry wait with [`HeraldError::Cancelled`].

use super::chat::{
    ChatMessage, ChatRequest, ChatResponse, Choice, MessageRole, ToolCall, ToolCallFunction, ToolDefinition,
    Usage,
};
use super::LlmConfig;
use crate::error::{HeraldError, Result};
use crate::util::{sanitize_base_url, validate_api_key};
use rand::Rng;
use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, RETRY_AFTER},
    Client as HttpClient, StatusCode,
};
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Retries after the first attempt for 429 / 5xx / network failures
const MAX_RETRIES: u32 = 3;

/// First backoff delay, doubled on each retry
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// LLM Provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    /// OpenAI-compatible API (works with OpenAI, Ollama, OpenRouter, local models)
    OpenAiCompatible,
    /// Google Generative AI (Gemini)
    GoogleGenerativeAi,
}

impl std::str::FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "ollama" | "lmstudio" | "local" | "openrouter" | "custom" => {
                Ok(LlmProvider::OpenAiCompatible)
            }
            "google" | "gemini" | "google-ai" | "google-generativeai" => {
                Ok(LlmProvider::GoogleGenerativeAi)
            }
            _ => Err(format!("Unknown LLM provider: {}", s)),
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProvider::OpenAiCompatible => write!(f, "OpenAI Compatible"),
            LlmProvider::GoogleGenerativeAi => write!(f, "Google Generative AI"),
        }
    }
}

/// Main LLM Client
pub struct LlmClient {
    config: LlmConfig,
    base_url: String,
    http_client: HttpClient,
}

impl LlmClient {
    /// Create a new LLM client
    pub fn new(config: LlmConfig) -> Result<Self> {
        let base_url = sanitize_base_url(&config.base_url, "Base URL")?;
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(concat!("herald/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HeraldError::Internal {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(LlmClient {
            config,
            base_url,
            http_client,
        })
    }

    /// Send a chat request and get a response
    pub async fn chat(&self, request: &ChatRequest, cancel: &CancellationToken) -> Result<ChatResponse> {
        debug!(
            model = %self.config.model,
            messages = request.messages.len(),
            tools = request.tools.as_ref().map(Vec::len).unwrap_or(0),
            "Chat request"
        );

        let started = std::time::Instant::now();
        let result = match self.config.provider {
            LlmProvider::OpenAiCompatible => self.chat_openai(request, cancel).await,
            LlmProvider::GoogleGenerativeAi => self.chat_gemini(request, cancel).await,
        };

        match &result {
            Ok(response) => match response.usage {
                Some(usage) => info!(elapsed = ?started.elapsed(), %usage, "Chat completed"),
                None => info!(elapsed = ?started.elapsed(), "Chat completed (no usage data)"),
            },
            Err(HeraldError::Cancelled) => debug!(elapsed = ?started.elapsed(), "Chat cancelled"),
            Err(e) => warn!(elapsed = ?started.elapsed(), error = %e, "Chat failed"),
        }

        result
    }

    /// Helper with jittered backoff retry, respecting Retry-After headers and cancellation
    ///
    /// Whether a failure is worth another attempt is decided by
    /// [`HeraldError::is_retryable`]; a provider-supplied delay wins over backoff.
    async fn send_with_retry<F, Fut>(&self, cancel: &CancellationToken, operation: F) -> Result<reqwest::Response>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = std::result::Result<reqwest::Response, reqwest::Error>>,
    {
        let mut attempt = 0;
        let mut delay = INITIAL_BACKOFF;

        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(HeraldError::Cancelled),
                outcome = operation() => outcome,
            };

            let wait = match outcome {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    let error = HeraldError::from_status(
                        status.as_u16(),
                        status.to_string(),
                        retry_after(response.headers()),
                    );
                    if attempt >= MAX_RETRIES || !error.is_retryable() {
                        return Ok(response);
                    }
                    warn!(error = %error, "Provider rejected request");
                    error.retry_delay().unwrap_or(delay)
                }
                Err(e) => {
                    let error = HeraldError::from(e);
                    if attempt >= MAX_RETRIES || !error.is_retryable() {
                        return Err(error);
                    }
                    warn!(error = %error, "Network error talking to provider");
                    delay
                }
            };

            attempt += 1;
            warn!(?wait, attempt, max = MAX_RETRIES, "Provider request failed, retrying");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(HeraldError::Cancelled),
                _ = sleep(wait) => {}
            }

            // Jitter: +/- 250ms
            let jitter_ms = rand::thread_rng().gen_range(-250..=250);
            let next_ms = (delay.as_millis() as i64 * 2 + jitter_ms).max(0) as u64;
            delay = Duration::from_millis(next_ms);
        }
    }

    /// OpenAI-compatible API chat
    async fn chat_openai(&self, request: &ChatRequest, cancel: &CancellationToken) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = OpenAiRequest {
            model: &self.config.model,
            messages: &request.messages,
            max_tokens: request.max_tokens.or(self.config.max_tokens),
            temperature: request.temperature.or(self.config.temperature),
            tools: request.tools.as_deref(),
            stream: false,
        };

        let headers = self.build_headers()?;
        let response = self
            .send_with_retry(cancel, || {
                self.http_client
                    .post(&url)
                    .headers(headers.clone())
                    .json(&body)
                    .send()
            })
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(error_from_response(response).await);
        }

        let text = response.text().await?;
        let response_body: OpenAiResponse =
            serde_json::from_str(&text).map_err(|e| HeraldError::MalformedResponse {
                provider: "openai".to_string(),
                message: e.to_string(),
            })?;

        let choices = response_body
            .choices
            .into_iter()
            .map(|c| Choice {
                index: c.index,
                message: ChatMessage {
                    role: MessageRole::Assistant,
                    content: c.message.content.unwrap_or_default(),
                    name: None,
                    tool_call_id: None,
                    tool_calls: c.message.tool_calls.filter(|calls| !calls.is_empty()),
                },
                finish_reason: c.finish_reason,
            })
            .collect();

        Ok(ChatResponse {
            id: response_body.id,
            model: response_body.model.unwrap_or_else(|| self.config.model.clone()),
            choices,
            usage: response_body.usage,
        })
    }

    /// Google Gemini API chat
    ///
    /// Tools go out as `functionDeclarations`; `functionCall` parts come back
    /// as [`ToolCall`]s so the tool loop works the same on both backends.
    async fn chat_gemini(&self, request: &ChatRequest, cancel: &CancellationToken) -> Result<ChatResponse> {
        let (contents, system_instruction) = to_gemini_contents(&request.messages);

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.config.model
        );

        let tools = request.tools.as_deref().map(|tools| {
            vec![GeminiTool {
                function_declarations: tools.iter().map(GeminiFunctionDeclaration::from).collect(),
            }]
        });

        let body = GeminiRequest {
            contents,
            system_instruction,
            tools,
            generation_config: Some(GeminiGenerationConfig {
                max_output_tokens: request.max_tokens.or(self.config.max_tokens),
                temperature: request.temperature.or(self.config.temperature),
            }),
        };

        let headers = self.build_headers()?;
        let response = self
            .send_with_retry(cancel, || {
                self.http_client
                    .post(&url)
                    .headers(headers.clone())
                    .json(&body)
                    .send()
            })
            .await?;

        if response.status() != StatusCode::OK {
            return Err(error_from_response(response).await);
        }

        let text = response.text().await?;
        let response_body: GeminiResponse =
            serde_json::from_str(&text).map_err(|e| HeraldError::MalformedResponse {
                provider: "gemini".to_string(),
                message: e.to_string(),
            })?;

        let choices = response_body
            .candidates
            .into_iter()
            .map(|c| Choice {
                index: c.index,
                message: from_gemini_content(c.content.unwrap_or_default()),
                finish_reason: c.finish_reason,
            })
            .collect();

        Ok(ChatResponse {
            id: "gemini".to_string(),
            model: self.config.model.clone(),
            choices,
            usage: response_body.usage_metadata.map(|u| Usage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            }),
        })
    }

    /// Build headers for API requests
    fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let Some(api_key) = self.config.api_key.as_deref() else {
            return Ok(headers);
        };
        let validated_key = validate_api_key(api_key)?;
        let invalid = |e: reqwest::header::InvalidHeaderValue| HeraldError::InvalidConfig {
            message: format!("Invalid API key header: {}", e),
        };

        match self.config.provider {
            LlmProvider::OpenAiCompatible => {
                if self.base_url.contains("openrouter.ai") {
                    headers.insert("X-Title", HeaderValue::from_static("herald"));
                }
                let auth_value = format!("Bearer {}", validated_key);
                headers.insert("Authorization", auth_value.parse().map_err(invalid)?);
            }
            LlmProvider::GoogleGenerativeAi => {
                headers.insert("x-goog-api-key", validated_key.parse().map_err(invalid)?);
            }
        }

        Ok(headers)
    }

    /// Get the model name
    pub fn model(&self) -> &str {
        &self.config.model
    }
}

/// Seconds from a `Retry-After` header
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Turn a non-200 response into a classified error
async fn error_from_response(response: reqwest::Response) -> HeraldError {
    let status = response.status();
    let retry_after = retry_after(response.headers());
    let error_body: Option<serde_json::Value> = response.json().await.ok();
    let error_msg = error_body
        .as_ref()
        .and_then(|v| v.get("error").and_then(|e| e.get("message")))
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown error")
        .to_string();
    HeraldError::from_status(status.as_u16(), error_msg, retry_after)
}

/// Convert chat history to Gemini contents, merging consecutive turns of the
/// same role and lifting system messages into the system instruction.
///
/// Assistant tool calls become `functionCall` parts and tool results become
/// `functionResponse` parts on a user turn.
fn to_gemini_contents(messages: &[ChatMessage]) -> (Vec<GeminiContent>, Option<GeminiContent>) {
    let mut contents: Vec<GeminiContent> = Vec::new();
    let mut system_parts: Vec<String> = Vec::new();

    for m in messages {
        let parts = match m.role {
            MessageRole::System => {
                if !m.content.trim().is_empty() {
                    system_parts.push(m.content.clone());
                }
                continue;
            }
            MessageRole::Tool => vec![GeminiPart::function_response(
                m.name.clone().unwrap_or_default(),
                &m.content,
            )],
            MessageRole::User | MessageRole::Assistant => {
                let mut parts = Vec::new();
                if !m.content.trim().is_empty() {
                    parts.push(GeminiPart::text(m.content.clone()));
                }
                for call in m.tool_calls.iter().flatten() {
                    parts.push(GeminiPart::function_call(call));
                }
                parts
            }
        };
        if parts.is_empty() {
            continue;
        }

        let role = match m.role {
            MessageRole::Assistant => "model",
            _ => "user",
        };

        match contents.last_mut() {
            Some(last) if last.role == role => {
                for part in parts {
                    last.push_part(part);
                }
            }
            _ => contents.push(GeminiContent {
                role: role.to_string(),
                parts,
            }),
        }
    }

    // Gemini requires the conversation to open with a user turn
    while contents.first().is_some_and(|c| c.role != "user") {
        contents.remove(0);
    }

    let system_instruction = if system_parts.is_empty() {
        None
    } else {
        Some(GeminiContent {
            role: "system".to_string(),
            parts: vec![GeminiPart::text(system_parts.join("\n\n"))],
        })
    };

    (contents, system_instruction)
}

/// Assistant message from a Gemini candidate; call ids are positional since
/// Gemini does not assign any
fn from_gemini_content(content: GeminiContent) -> ChatMessage {
    let mut text = String::new();
    let mut calls = Vec::new();

    for part in content.parts {
        if let Some(t) = part.text {
            text.push_str(&t);
        }
        if let Some(call) = part.function_call {
            let arguments = if call.args.is_null() {
                "{}".to_string()
            } else {
                call.args.to_string()
            };
            calls.push(ToolCall {
                id: format!("call_{}", calls.len()),
                type_: "function".to_string(),
                function: ToolCallFunction {
                    name: call.name,
                    arguments,
                },
            });
        }
    }

    if calls.is_empty() {
        ChatMessage::assistant(text)
    } else {
        ChatMessage::assistant_tool_calls(text, calls)
    }
}

// OpenAI-compatible API types
#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: Option<String>,
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    #[serde(default)]
    index: u32,
    message: OpenAiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

// Gemini API types
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool<'a> {
    function_declarations: Vec<GeminiFunctionDeclaration<'a>>,
}

#[derive(Serialize)]
struct GeminiFunctionDeclaration<'a> {
    name: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<&'a serde_json::Value>,
}

impl<'a> From<&'a ToolDefinition> for GeminiFunctionDeclaration<'a> {
    fn from(tool: &'a ToolDefinition) -> Self {
        // Gemini rejects object schemas without properties
        let parameters = &tool.function.parameters;
        let has_properties = parameters
            .get("properties")
            .and_then(|p| p.as_object())
            .is_some_and(|p| !p.is_empty());

        Self {
            name: &tool.function.name,
            description: &tool.function.description,
            parameters: has_properties.then_some(parameters),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
struct GeminiContent {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

impl GeminiContent {
    /// Append a part, folding text into a trailing text part
    fn push_part(&mut self, part: GeminiPart) {
        if let (Some(new_text), Some(last)) = (part.plain_text(), self.parts.last_mut()) {
            if last.is_plain_text() {
                if let Some(last_text) = last.text.as_mut() {
                    last_text.push_str("\n\n");
                    last_text.push_str(new_text);
                    return;
                }
            }
        }
        self.parts.push(part);
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<GeminiFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<GeminiFunctionResponse>,
}

impl GeminiPart {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            ..Self::default()
        }
    }

    fn function_call(call: &ToolCall) -> Self {
        let args = serde_json::from_str(&call.function.arguments)
            .unwrap_or_else(|_| serde_json::json!({}));
        Self {
            function_call: Some(GeminiFunctionCall {
                name: call.function.name.clone(),
                args,
            }),
            ..Self::default()
        }
    }

    fn function_response(name: String, content: &str) -> Self {
        Self {
            function_response: Some(GeminiFunctionResponse {
                name,
                response: serde_json::json!({ "content": content }),
            }),
            ..Self::default()
        }
    }

    fn is_plain_text(&self) -> bool {
        self.text.is_some() && self.function_call.is_none() && self.function_response.is_none()
    }

    fn plain_text(&self) -> Option<&str> {
        self.text.as_deref().filter(|_| self.is_plain_text())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct GeminiFunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    index: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}
