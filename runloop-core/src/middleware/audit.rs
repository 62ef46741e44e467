// runloop-core/src/middleware/audit.rs
// ============================================================================
// Module: Audit Middleware
// Description: Writes one JSON-lines record per tool call to an audit sink.
// Purpose: Give an operator a tamper-evident-by-construction record of every
//          call distinct from the evidence log (which only records
//          successes the planner chose to keep).
// Dependencies: crate::{middleware, model::tool}, serde_json
// ============================================================================

//! ## Overview
//! Every call, success or failure, produces exactly one [`AuditRecord`]
//! written through an [`AuditSink`]. [`InMemoryAuditSink`] buffers records
//! for tests; a production embedder supplies a sink writing to a file,
//! object store, or log shipper.

use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;

use crate::middleware::Middleware;
use crate::middleware::Next;
use crate::model::identifiers::ToolName;
use crate::model::tool::ToolContext;
use crate::model::tool::ToolHandlerError;

/// One JSON-lines audit record for a single tool call.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    run_id: String,
    tool: String,
    state: String,
    reason: String,
    succeeded: bool,
    error_message: Option<String>,
}

/// Receives audit records as they are produced. Implementations must not
/// drop records silently; a sink that cannot persist a record should at
/// least retain it in memory rather than lose it.
pub trait AuditSink: Send + Sync {
    /// Writes one audit record.
    fn write(&self, record: AuditRecord);
}

/// Reference [`AuditSink`] that buffers records in memory.
#[derive(Default)]
pub struct InMemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl InMemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all buffered records in write order.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        self.records.lock().expect("audit sink mutex poisoned").clone()
    }

    /// Renders every buffered record as one JSON-lines document, newline
    /// terminated, in write order.
    ///
    /// # Errors
    /// Returns a serialization error if a record cannot be encoded as JSON,
    /// which cannot happen for this module's own record type but is
    /// surfaced for callers that might extend it.
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        let mut output = String::new();
        for record in self.records() {
            output.push_str(&serde_json::to_string(&record)?);
            output.push('\n');
        }
        Ok(output)
    }
}

impl AuditSink for InMemoryAuditSink {
    fn write(&self, record: AuditRecord) {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        self.records.lock().expect("audit sink mutex poisoned").push(record);
    }
}

/// Middleware that writes one [`AuditRecord`] per call to the configured sink.
pub struct AuditMiddleware {
    sink: std::sync::Arc<dyn AuditSink>,
    tool: ToolName,
}

impl AuditMiddleware {
    /// Builds an audit layer scoped to `tool`, writing through `sink`.
    #[must_use]
    pub fn new(sink: std::sync::Arc<dyn AuditSink>, tool: ToolName) -> Self {
        Self { sink, tool }
    }
}

impl Middleware for AuditMiddleware {
    fn handle(
        &self,
        context: &ToolContext,
        input: &Value,
        next: &Next<'_>,
    ) -> Result<Value, ToolHandlerError> {
        let result = next.call(context, input);
        self.sink.write(AuditRecord {
            run_id: context.run_id.as_str().to_string(),
            tool: self.tool.as_str().to_string(),
            state: context.state.as_str().to_string(),
            reason: context.reason.clone(),
            succeeded: result.is_ok(),
            error_message: result.as_ref().err().map(|error| error.message.clone()),
        });
        result
    }
}

#[cfg(test)]
mod tests {
    use super::AuditMiddleware;
    use super::InMemoryAuditSink;
    use crate::middleware::MiddlewareChain;
    use crate::model::identifiers::RunId;
    use crate::model::identifiers::ToolName;
    use crate::model::state::State;
    use crate::model::tool::ToolContext;
    use std::sync::Arc;

    fn test_context() -> ToolContext {
        ToolContext {
            run_id: RunId::new("run-1"),
            state: State::Act,
            reason: "looking things up".to_string(),
            deadline_ms: 0,
        }
    }

    #[test]
    fn records_one_entry_per_call_with_the_failure_message() {
        let sink = Arc::new(InMemoryAuditSink::new());
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(AuditMiddleware::new(sink.clone(), ToolName::new("search"))));

        let _ = chain.run(&test_context(), &serde_json::Value::Null, &|_ctx, _input| {
            Err(crate::model::tool::ToolHandlerError::new("not found"))
        });

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert!(!records[0].succeeded);
        assert_eq!(records[0].error_message.as_deref(), Some("not found"));
    }

    #[test]
    fn renders_buffered_records_as_jsonl() {
        let sink = Arc::new(InMemoryAuditSink::new());
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(AuditMiddleware::new(sink.clone(), ToolName::new("search"))));

        let _ = chain.run(&test_context(), &serde_json::Value::Null, &|_ctx, input| Ok(input.clone()));

        let jsonl = sink.to_jsonl();
        assert!(jsonl.is_ok());
        #[allow(clippy::unwrap_used, reason = "checked is_ok above")]
        let rendered = jsonl.unwrap();
        assert_eq!(rendered.lines().count(), 1);
    }
}
