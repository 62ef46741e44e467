// runloop-core/src/middleware/tracing.rs
// ============================================================================
// Module: Tracing Middleware
// Description: Emits a span around every tool call.
// Purpose: Let an embedder observe call/latency structure without coupling
//          the engine to a specific tracing backend.
// Dependencies: crate::{middleware, model::tool}
// ============================================================================

//! ## Overview
//! [`Tracer`] is the seam; [`InMemoryTracer`] is a reference sink useful for
//! tests and simple embedders. A production embedder supplies its own
//! [`Tracer`] wired to whatever observability stack it already runs.

use std::sync::Mutex;

use serde_json::Value;

use crate::middleware::Middleware;
use crate::middleware::Next;
use crate::model::tool::ToolContext;
use crate::model::tool::ToolHandlerError;

/// One completed span: a tool call's name, outcome and duration.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    /// The run this span belongs to.
    pub run_id: String,
    /// Whether the wrapped call succeeded.
    pub succeeded: bool,
    /// Wall-clock duration of the call, in milliseconds.
    pub duration_ms: u64,
}

/// Receives completed spans. Implementations must not block the caller for
/// long, since spans are emitted synchronously on the call path.
pub trait Tracer: Send + Sync {
    /// Records a completed span.
    fn record(&self, span: Span);
}

/// Reference [`Tracer`] that buffers spans in memory.
#[derive(Default)]
pub struct InMemoryTracer {
    spans: Mutex<Vec<Span>>,
}

impl InMemoryTracer {
    /// Creates an empty tracer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all recorded spans in emission order.
    #[must_use]
    pub fn spans(&self) -> Vec<Span> {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        self.spans.lock().expect("tracer mutex poisoned").clone()
    }
}

impl Tracer for InMemoryTracer {
    fn record(&self, span: Span) {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        self.spans.lock().expect("tracer mutex poisoned").push(span);
    }
}

/// Middleware that times the wrapped call and emits one [`Span`] per
/// invocation, regardless of outcome.
pub struct TracingMiddleware {
    tracer: std::sync::Arc<dyn Tracer>,
    clock_ms: std::sync::Arc<dyn Fn() -> u64 + Send + Sync>,
}

impl TracingMiddleware {
    /// Builds a tracing layer reporting to `tracer`, using the wall clock.
    #[must_use]
    pub fn new(tracer: std::sync::Arc<dyn Tracer>) -> Self {
        Self {
            tracer,
            clock_ms: std::sync::Arc::new(wall_clock_ms),
        }
    }

    /// Builds a tracing layer with an injected clock, for deterministic tests.
    #[must_use]
    pub fn with_clock(
        tracer: std::sync::Arc<dyn Tracer>,
        clock_ms: std::sync::Arc<dyn Fn() -> u64 + Send + Sync>,
    ) -> Self {
        Self { tracer, clock_ms }
    }
}

/// Current wall-clock time as Unix-epoch milliseconds.
fn wall_clock_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

impl Middleware for TracingMiddleware {
    fn handle(
        &self,
        context: &ToolContext,
        input: &Value,
        next: &Next<'_>,
    ) -> Result<Value, ToolHandlerError> {
        let start = (self.clock_ms)();
        let result = next.call(context, input);
        let end = (self.clock_ms)();
        self.tracer.record(Span {
            run_id: context.run_id.as_str().to_string(),
            succeeded: result.is_ok(),
            duration_ms: end.saturating_sub(start),
        });
        result
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryTracer;
    use super::TracingMiddleware;
    use crate::middleware::MiddlewareChain;
    use crate::model::identifiers::RunId;
    use crate::model::state::State;
    use crate::model::tool::ToolContext;
    use std::sync::Arc;

    fn test_context() -> ToolContext {
        ToolContext {
            run_id: RunId::new("run-1"),
            state: State::Act,
            reason: "test".to_string(),
            deadline_ms: 0,
        }
    }

    #[test]
    fn records_one_span_per_call_regardless_of_outcome() {
        let tracer = Arc::new(InMemoryTracer::new());
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(TracingMiddleware::new(tracer.clone())));

        let _ = chain.run(&test_context(), &serde_json::Value::Null, &|_ctx, input| Ok(input.clone()));
        let _ = chain.run(&test_context(), &serde_json::Value::Null, &|_ctx, _input| {
            Err(crate::model::tool::ToolHandlerError::new("boom"))
        });

        let spans = tracer.spans();
        assert_eq!(spans.len(), 2);
        assert!(spans[0].succeeded);
        assert!(!spans[1].succeeded);
    }
}
