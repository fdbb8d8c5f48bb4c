//! Chat-completion capability backed by [`LlmClient`]
//!
//! Runs the automatic tool loop: tool calls requested by the model are
//! executed through the supplied [`ToolCapability`] and their results fed
//! back until the model answers with text or the round limit is reached.

use crate::agent::runtime::{
    capability::{Capability, ChatCompletion, ChatCompletionOutput, ToolCapability},
    context::RuntimeContext,
    error::LlmError,
};
use crate::llm::chat::{ChatMessage, ChatRequest, Usage};
use crate::llm::LlmClient;
use std::sync::Arc;
use tracing::{debug, info};

/// Default number of tool rounds before the model must answer in text
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 5;

/// LLM capability backed by existing LlmClient
pub struct LlmClientCapability {
    client: Arc<LlmClient>,
    max_tool_rounds: usize,
}

impl LlmClientCapability {
    pub fn new(client: Arc<LlmClient>) -> Self {
        Self {
            client,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }
}

impl Capability for LlmClientCapability {
    fn name(&self) -> &'static str {
        "llm-client"
    }
}

#[async_trait::async_trait]
impl ChatCompletion for LlmClientCapability {
    async fn complete(
        &self,
        ctx: &RuntimeContext,
        history: &[ChatMessage],
        tools: Option<Arc<dyn ToolCapability>>,
    ) -> Result<ChatCompletionOutput, LlmError> {
        let definitions = tools.as_ref().map(|t| t.definitions()).unwrap_or_default();
        let mut messages = history.to_vec();
        let mut usage = Usage::default();
        let mut round = 0;

        loop {
            if ctx.is_cancelled() {
                return Err(LlmError::Cancelled);
            }

            // The final round withholds tools so the model has to answer
            let tools_allowed = round < self.max_tool_rounds;
            let mut request = ChatRequest::new(self.client.model().to_string(), messages.clone());
            if tools_allowed {
                request = request.with_tools(definitions.clone());
            }

            let response = self.client.chat(&request, &ctx.cancellation).await?;
            if let Some(u) = response.usage {
                usage += u;
            }

            let Some(message) = response.message() else {
                return Ok(ChatCompletionOutput { text: None, usage });
            };
            let text = Some(message.content.clone()).filter(|t| !t.is_empty());

            let calls = match &message.tool_calls {
                Some(calls) if !calls.is_empty() => calls,
                _ => return Ok(ChatCompletionOutput { text, usage }),
            };

            let registry = match &tools {
                Some(registry) if tools_allowed => registry,
                _ if text.is_some() => return Ok(ChatCompletionOutput { text, usage }),
                _ => {
                    return Err(LlmError::new(format!(
                        "model kept requesting tools after {} rounds",
                        self.max_tool_rounds
                    )))
                }
            };

            info!(trace_id = %ctx.trace_id, round, calls = calls.len(), "Model requested tool calls");
            messages.push(ChatMessage::assistant_tool_calls(
                message.content.clone(),
                calls.clone(),
            ));

            for call in calls {
                if ctx.is_cancelled() {
                    return Err(LlmError::Cancelled);
                }
                let content = match registry.execute(ctx, call).await {
                    Ok(output) => output.into_content(),
                    Err(e) => format!("ERROR: {}", e),
                };
                debug!(tool = %call.function.name, bytes = content.len(), "Tool call finished");
                messages.push(ChatMessage::tool(
                    call.id.clone(),
                    call.function.name.clone(),
                    content,
                ));
            }

            round += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::runtime::impls::ToolRegistry;
    use crate::llm::stub::{StubResponse, StubServer};
    use crate::llm::{LlmConfig, LlmProvider};

    fn capability() -> LlmClientCapability {
        let config = LlmConfig::new(
            LlmProvider::OpenAiCompatible,
            "http://127.0.0.1:9/v1".to_string(),
            "test-model".to_string(),
            None,
        );
        LlmClientCapability::new(Arc::new(LlmClient::new(config).unwrap())).with_max_tool_rounds(2)
    }

    fn stub_capability(provider: LlmProvider, server: &StubServer, rounds: usize) -> LlmClientCapability {
        let config = LlmConfig::new(provider, server.base_url.clone(), "test-model".to_string(), None);
        LlmClientCapability::new(Arc::new(LlmClient::new(config).unwrap())).with_max_tool_rounds(rounds)
    }

    fn default_tools() -> Option<Arc<dyn ToolCapability>> {
        Some(Arc::new(ToolRegistry::with_defaults()))
    }

    fn openai_tool_call() -> StubResponse {
        StubResponse::json(serde_json::json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": null,
                "tool_calls": [{"id": "call_1", "type": "function",
                    "function": {"name": "current_time", "arguments": "{}"}}]}}],
            "usage": {"prompt_tokens": 4, "completion_tokens": 1, "total_tokens": 5}
        }))
    }

    fn openai_text(text: &str) -> StubResponse {
        StubResponse::json(serde_json::json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": text}}],
            "usage": {"prompt_tokens": 6, "completion_tokens": 2, "total_tokens": 8}
        }))
    }

    #[test]
    fn test_capability_name() {
        assert_eq!(capability().name(), "llm-client");
    }

    #[tokio::test]
    async fn test_cancelled_context_short_circuits() {
        let ctx = RuntimeContext::new();
        ctx.cancellation.cancel();

        let result = capability()
            .complete(&ctx, &[ChatMessage::user("hi")], default_tools())
            .await;
        assert!(matches!(result, Err(LlmError::Cancelled)));
    }

    #[tokio::test]
    async fn test_tool_results_are_fed_back() {
        let server = StubServer::start(vec![openai_tool_call(), openai_text("It is noon.")]).await;
        let chat = stub_capability(LlmProvider::OpenAiCompatible, &server, 3);

        let output = chat
            .complete(&RuntimeContext::new(), &[ChatMessage::user("time?")], default_tools())
            .await
            .unwrap();
        assert_eq!(output.text.as_deref(), Some("It is noon."));
        assert_eq!(output.usage.total_tokens, 13);

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].json()["tools"][0]["function"]["name"], "current_time");

        let followup = requests[1].json();
        let messages = followup["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["tool_calls"][0]["id"], "call_1");
        assert_eq!(messages[2]["role"], "tool");
        assert_eq!(messages[2]["tool_call_id"], "call_1");
        assert!(!messages[2]["content"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_final_round_withholds_tools() {
        let server = StubServer::start(vec![openai_tool_call(), openai_text("done")]).await;
        let chat = stub_capability(LlmProvider::OpenAiCompatible, &server, 1);

        let output = chat
            .complete(&RuntimeContext::new(), &[ChatMessage::user("time?")], default_tools())
            .await
            .unwrap();
        assert_eq!(output.text.as_deref(), Some("done"));

        let requests = server.requests();
        assert!(requests[0].json().get("tools").is_some());
        assert!(requests[1].json().get("tools").is_none());
    }

    #[tokio::test]
    async fn test_round_limit_exhausted() {
        let server = StubServer::start(vec![openai_tool_call(), openai_tool_call()]).await;
        let chat = stub_capability(LlmProvider::OpenAiCompatible, &server, 1);

        let result = chat
            .complete(&RuntimeContext::new(), &[ChatMessage::user("time?")], default_tools())
            .await;
        match result {
            Err(LlmError::Upstream { message }) => {
                assert_eq!(message, "model kept requesting tools after 1 rounds")
            }
            other => panic!("unexpected result: {:?}", other.map(|o| o.text)),
        }
        assert_eq!(server.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_tool_loop_on_gemini() {
        let server = StubServer::start(vec![
            StubResponse::json(serde_json::json!({
                "candidates": [{"content": {"role": "model", "parts": [
                    {"functionCall": {"name": "current_time", "args": {}}}
                ]}}]
            })),
            StubResponse::json(serde_json::json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": "Headlines as of now."}]}}]
            })),
        ])
        .await;
        let chat = stub_capability(LlmProvider::GoogleGenerativeAi, &server, 3);

        let output = chat
            .complete(&RuntimeContext::new(), &[ChatMessage::user("news?")], default_tools())
            .await
            .unwrap();
        assert_eq!(output.text.as_deref(), Some("Headlines as of now."));

        let followup = server.requests()[1].json();
        let contents = followup["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["parts"][0]["functionCall"]["name"], "current_time");
        assert_eq!(contents[2]["parts"][0]["functionResponse"]["name"], "current_time");
    }
}
