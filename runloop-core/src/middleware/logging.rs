// runloop-core/src/middleware/logging.rs
// ============================================================================
// Module: Logging Middleware
// Description: Writes one JSON-lines line per tool call for human-facing logs.
// Purpose: Distinct from audit: logging is for operators reading a live
//          stream, audit is for a durable compliance record. The two sinks
//          may be pointed at the same place but are never conflated.
// Dependencies: crate::{middleware, model::tool}, serde_json
// ============================================================================

//! ## Overview
//! There is no logging-framework dependency in this workspace; a [`LogSink`]
//! is a plain trait and [`StdoutLogSink`] is the reference sink that writes
//! one compact JSON object per line. Anything richer (rotation, shipping,
//! structured spans) is an embedder concern.

use serde::Serialize;
use serde_json::Value;

use crate::middleware::Middleware;
use crate::middleware::Next;
use crate::model::identifiers::ToolName;
use crate::model::tool::ToolContext;
use crate::model::tool::ToolHandlerError;

/// Severity of one log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    /// A call completed, successfully or not; routine operational detail.
    Info,
    /// A call failed.
    Warn,
}

/// One JSON-lines log entry.
#[derive(Debug, Clone, Serialize)]
pub struct LogLine {
    level: Level,
    run_id: String,
    tool: String,
    message: String,
}

/// Receives rendered log lines.
pub trait LogSink: Send + Sync {
    /// Writes one line (without a trailing newline).
    fn write_line(&self, line: &str);
}

/// Reference [`LogSink`] writing JSON-lines to standard output.
///
/// This is the only place in the crate permitted to print, and is gated
/// behind the `stdout-logging` feature-equivalent: embedders that prefer a
/// silent default should supply their own [`LogSink`] instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutLogSink;

impl LogSink for StdoutLogSink {
    #[allow(clippy::print_stdout, reason = "this sink's entire purpose is writing to stdout")]
    fn write_line(&self, line: &str) {
        println!("{line}");
    }
}

/// Middleware that writes one [`LogLine`] per call to the configured sink.
pub struct LoggingMiddleware {
    sink: std::sync::Arc<dyn LogSink>,
    tool: ToolName,
}

impl LoggingMiddleware {
    /// Builds a logging layer scoped to `tool`, writing through `sink`.
    #[must_use]
    pub fn new(sink: std::sync::Arc<dyn LogSink>, tool: ToolName) -> Self {
        Self { sink, tool }
    }
}

impl Middleware for LoggingMiddleware {
    fn handle(
        &self,
        context: &ToolContext,
        input: &Value,
        next: &Next<'_>,
    ) -> Result<Value, ToolHandlerError> {
        let result = next.call(context, input);
        let (level, message) = match &result {
            Ok(_) => (Level::Info, format!("{} completed in state {}", self.tool, context.state)),
            Err(error) => (Level::Warn, format!("{} failed: {}", self.tool, error.message)),
        };
        let line = LogLine {
            level,
            run_id: context.run_id.as_str().to_string(),
            tool: self.tool.as_str().to_string(),
            message,
        };
        if let Ok(rendered) = serde_json::to_string(&line) {
            self.sink.write_line(&rendered);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::LogSink;
    use super::LoggingMiddleware;
    use crate::middleware::MiddlewareChain;
    use crate::model::identifiers::RunId;
    use crate::model::identifiers::ToolName;
    use crate::model::state::State;
    use crate::model::tool::ToolContext;
    use std::sync::Arc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        lines: Mutex<Vec<String>>,
    }

    impl LogSink for RecordingSink {
        fn write_line(&self, line: &str) {
            #[allow(clippy::unwrap_used, reason = "test-only mutex, never contended or poisoned")]
            self.lines.lock().unwrap().push(line.to_string());
        }
    }

    fn test_context() -> ToolContext {
        ToolContext {
            run_id: RunId::new("run-1"),
            state: State::Act,
            reason: "test".to_string(),
            deadline_ms: 0,
        }
    }

    #[test]
    fn writes_a_json_line_per_call() {
        let sink = Arc::new(RecordingSink::default());
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(LoggingMiddleware::new(sink.clone(), ToolName::new("search"))));

        let _ = chain.run(&test_context(), &serde_json::Value::Null, &|_ctx, input| Ok(input.clone()));

        #[allow(clippy::unwrap_used, reason = "test-only mutex, never contended or poisoned")]
        let lines = sink.lines.lock().unwrap().clone();
        assert_eq!(lines.len(), 1);
        assert!(serde_json::from_str::<serde_json::Value>(&lines[0]).is_ok());
    }
}
