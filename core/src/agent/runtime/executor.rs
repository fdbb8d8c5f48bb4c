//! Task executor
//!
//! [`AgentRuntime`] turns one task into a lazy stream holding exactly one
//! terminal [`ResponseEvent`]. Every execution registers a cancellation
//! controller for its task id and releases it on every exit path.

use crate::agent::runtime::{
    capability::{ChatCompletion, ChatCompletionOutput, ToolCapability},
    context::{RuntimeContext, TraceId},
    error::{LlmError, RuntimeError},
    ids::{IdGenerator, UuidGenerator},
    registry::TaskRegistry,
    response::{ResponseEvent, ResponseSynthesizer},
};
use crate::agent::session::{SessionJanitor, SessionStore};
use crate::protocol::{Part, Task};
use crate::util::truncate_for_log;
use futures::stream::{BoxStream, StreamExt};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Task execution runtime shared by every caller
#[derive(Clone)]
pub struct AgentRuntime {
    sessions: Arc<SessionStore>,
    registry: Arc<TaskRegistry>,
    chat: Arc<dyn ChatCompletion>,
    tools: Option<Arc<dyn ToolCapability>>,
    ids: Arc<dyn IdGenerator>,
    synthesizer: ResponseSynthesizer,
    evict_idle: bool,
}

impl AgentRuntime {
    pub fn new(chat: Arc<dyn ChatCompletion>, system_prompt: impl Into<String>) -> Self {
        let ids: Arc<dyn IdGenerator> = Arc::new(UuidGenerator);
        Self {
            sessions: Arc::new(SessionStore::new(system_prompt)),
            registry: Arc::new(TaskRegistry::new()),
            chat,
            tools: None,
            synthesizer: ResponseSynthesizer::new(Arc::clone(&ids)),
            ids,
            evict_idle: false,
        }
    }

    /// Tools the model may invoke while answering
    pub fn with_tools(mut self, tools: Arc<dyn ToolCapability>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.synthesizer = ResponseSynthesizer::new(Arc::clone(&ids));
        self.ids = ids;
        self
    }

    /// Let `sweep_sessions` also evict sessions idle past `max_age`
    pub fn with_idle_eviction(mut self, evict_idle: bool) -> Self {
        self.evict_idle = evict_idle;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Janitor over this runtime's session store
    pub fn janitor(&self) -> SessionJanitor {
        SessionJanitor::new(Arc::clone(&self.sessions)).with_evict_idle(self.evict_idle)
    }

    /// Execute `task`, yielding its terminal event
    ///
    /// Nothing runs until the stream is polled. Cancelling `cancel` or calling
    /// [`cancel_task`](Self::cancel_task) with the task id ends the execution
    /// with a Cancelled event.
    pub fn execute(&self, task: Task, cancel: CancellationToken) -> BoxStream<'static, ResponseEvent> {
        let runtime = self.clone();
        async_stream::stream! {
            yield runtime.run(task, cancel).await;
        }
        .boxed()
    }

    /// Signal cancellation to a live task; `false` when no such task is running
    pub fn cancel_task(&self, task_id: &str) -> bool {
        self.registry.cancel(task_id)
    }

    /// Evict unused sessions
    pub fn sweep_sessions(&self, max_age: Duration) {
        self.janitor().sweep(max_age);
    }

    async fn run(&self, mut task: Task, cancel: CancellationToken) -> ResponseEvent {
        let task_id = self.resolve_id(task.id.take());
        let context_id = self.resolve_id(task.context_id.take());
        task.id = Some(task_id.clone());
        task.context_id = Some(context_id.clone());

        info!(task_id = %task_id, context_id = %context_id, "Executing task");

        let controller = cancel.child_token();
        let _registration = match self.registry.register(&task_id, controller.clone()) {
            Ok(guard) => guard,
            Err(e) => return self.synthesizer.error(&task, e),
        };

        // Stops a spawned model call if this execution is dropped early
        let _stop_on_exit = controller.clone().drop_guard();
        let ctx = RuntimeContext::with_cancellation(TraceId::from(task_id.as_str()), controller);

        match self.process(&task, &context_id, &ctx).await {
            Ok(text) => self.synthesizer.message(&task, text),
            Err(RuntimeError::Cancelled) => self.synthesizer.cancelled(&task),
            Err(e) => self.synthesizer.error(&task, e),
        }
    }

    async fn process(
        &self,
        task: &Task,
        context_id: &str,
        ctx: &RuntimeContext,
    ) -> Result<String, RuntimeError> {
        let task_id = ctx.trace_id.as_str();
        let session = self.sessions.get_or_create(context_id);

        let user_message = extract_user_message(task);
        if user_message.is_empty() {
            warn!(task_id = %task_id, "No valid user message found in task");
            return Err(RuntimeError::EmptyInput);
        }

        debug!(task_id = %task_id, message = %truncate_for_log(&user_message, 200), "Processing message");
        let history = session.push_user(user_message);

        let chat = Arc::clone(&self.chat);
        let tools = self.tools.clone();
        let call_ctx = ctx.child();
        let mut call = tokio::spawn(async move { chat.complete(&call_ctx, &history, tools).await });

        let joined = tokio::select! {
            biased;
            _ = ctx.cancellation.cancelled() => {
                call.abort();
                info!(task_id = %task_id, "Task was cancelled");
                return Err(RuntimeError::Cancelled);
            }
            joined = &mut call => joined,
        };

        let result: Result<ChatCompletionOutput, LlmError> = match joined {
            Ok(result) => result,
            Err(e) if e.is_panic() => {
                let reason = panic_message(e.into_panic());
                error!(task_id = %task_id, error = %reason, "Chat completion panicked");
                return Err(RuntimeError::Panicked(reason));
            }
            Err(e) => Err(LlmError::new(e.to_string())),
        };

        let output = match result {
            Ok(output) => output,
            Err(_) if ctx.is_cancelled() => {
                info!(task_id = %task_id, "Task was cancelled");
                return Err(RuntimeError::Cancelled);
            }
            Err(e) => {
                error!(task_id = %task_id, error = %e, "Error executing task");
                return Err(RuntimeError::Llm(e));
            }
        };

        match output.text.filter(|text| !text.trim().is_empty()) {
            Some(text) => {
                session.push_assistant(text.clone());
                debug!(task_id = %task_id, length = text.len(), usage = %output.usage, "Completed response");
                Ok(text)
            }
            None => {
                warn!(task_id = %task_id, "Empty response received");
                Err(RuntimeError::NoResponse)
            }
        }
    }

    fn resolve_id(&self, id: Option<String>) -> String {
        id.filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| self.ids.generate())
    }
}

/// Text of every non-blank text part, in order, joined by newlines and trimmed
///
/// Returns an empty string when the task carries no usable text.
pub fn extract_user_message(task: &Task) -> String {
    task.parts()
        .iter()
        .filter_map(Part::as_text)
        .filter(|text| !text.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "capability panicked".to_string()
    }
}
