//! Tool Registry - Dynamic tool management
//!
//! Tools are registered as closures together with the definition advertised
//! to the model. Unknown tools produce an error result, not a fault.

use crate::agent::runtime::{
    capability::{Capability, ToolCapability, ToolOutput},
    context::RuntimeContext,
    error::ToolError,
};
use crate::llm::chat::{ToolCall, ToolDefinition};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Tool function type
pub type ToolFn = Arc<
    dyn Fn(&RuntimeContext, &str) -> futures::future::BoxFuture<'static, Result<ToolOutput, ToolError>>
        + Send
        + Sync,
>;

struct RegisteredTool {
    definition: ToolDefinition,
    func: ToolFn,
}

/// Closure-backed tool registry
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in tools
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_defaults();
        registry
    }

    fn register_defaults(&mut self) {
        self.register(
            ToolDefinition::function(
                "current_time",
                "Current date and time in UTC (RFC 3339). Use it to judge how recent news is.",
                serde_json::json!({"type": "object", "properties": {}}),
            ),
            Arc::new(|_ctx, _args| {
                Box::pin(async move { Ok(ToolOutput::success(chrono::Utc::now().to_rfc3339())) })
            }),
        );
    }

    /// Register a tool; a later registration with the same name replaces it
    pub fn register(&mut self, definition: ToolDefinition, func: ToolFn) {
        let name = definition.name().to_string();
        debug!(tool = %name, "Registering tool");
        self.tools.insert(name, RegisteredTool { definition, func });
    }

    /// Check if tool exists
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Capability for ToolRegistry {
    fn name(&self) -> &'static str {
        "tool-registry"
    }
}

#[async_trait::async_trait]
impl ToolCapability for ToolRegistry {
    fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition.clone()).collect()
    }

    async fn execute(&self, ctx: &RuntimeContext, call: &ToolCall) -> Result<ToolOutput, ToolError> {
        let name = call.function.name.as_str();
        let Some(tool) = self.tools.get(name) else {
            warn!(tool = %name, trace_id = %ctx.trace_id, "Model requested unknown tool");
            return Ok(ToolOutput::error(format!("Unknown tool: {}", name)));
        };

        let args = if call.function.arguments.trim().is_empty() {
            "{}"
        } else {
            call.function.arguments.as_str()
        };
        if let Err(e) = serde_json::from_str::<serde_json::Value>(args) {
            return Ok(ToolOutput::error(format!("Invalid arguments for {}: {}", name, e)));
        }

        debug!(tool = %name, trace_id = %ctx.trace_id, "Executing tool");
        (tool.func)(ctx, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::chat::ToolCallFunction;

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            type_: "function".to_string(),
            function: ToolCallFunction {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_builtin_current_time() {
        let registry = ToolRegistry::with_defaults();
        assert!(registry.has_tool("current_time"));
        assert_eq!(registry.definitions()[0].name(), "current_time");

        let out = registry
            .execute(&RuntimeContext::new(), &call("current_time", ""))
            .await
            .unwrap();
        match out {
            ToolOutput::Success { output } => {
                assert!(chrono::DateTime::parse_from_rfc3339(&output).is_ok())
            }
            other => panic!("unexpected output: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_is_error_result() {
        let registry = ToolRegistry::new();
        let out = registry
            .execute(&RuntimeContext::new(), &call("headlines", "{}"))
            .await
            .unwrap();
        assert_eq!(out, ToolOutput::error("Unknown tool: headlines"));
    }

    #[tokio::test]
    async fn test_custom_tool_receives_arguments() {
        let mut registry = ToolRegistry::new();
        registry.register(
            ToolDefinition::function("echo", "Echo arguments", serde_json::json!({"type": "object"})),
            Arc::new(|_ctx, args| {
                let args = args.to_string();
                Box::pin(async move { Ok(ToolOutput::success(args)) })
            }),
        );

        let ctx = RuntimeContext::new();
        let out = registry.execute(&ctx, &call("echo", r#"{"q":"rust"}"#)).await.unwrap();
        assert_eq!(out.into_content(), r#"{"q":"rust"}"#);

        let bad = registry.execute(&ctx, &call("echo", "{not json")).await.unwrap();
        assert!(matches!(bad, ToolOutput::Error { .. }));
    }
}
