//! Runtime context
//!
//! Passed to every capability call. Contains cancellation and tracing.

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Trace identifier attached to every capability call of one execution
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TraceId(String);

impl TraceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for TraceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Runtime context for capability calls
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    /// Trace ID, the task id for executor-driven calls
    pub trace_id: TraceId,

    /// Cancellation token
    pub cancellation: CancellationToken,
}

impl RuntimeContext {
    pub fn new() -> Self {
        Self {
            trace_id: TraceId::new(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Context bound to an existing trace and token
    pub fn with_cancellation(trace_id: TraceId, cancellation: CancellationToken) -> Self {
        Self {
            trace_id,
            cancellation,
        }
    }

    /// Create child context with same trace
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            cancellation: self.cancellation.child_token(),
        }
    }

    /// Check if cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl Default for RuntimeContext {
    fn default() -> Self {
        Self::new()
    }
}
