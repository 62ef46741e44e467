// runloop-core/src/middleware/metrics.rs
// ============================================================================
// Module: Metrics Middleware
// Description: Counts tool calls by outcome.
// Purpose: Give an embedder call-volume and error-rate counters without
//          coupling the engine to a specific metrics backend.
// Dependencies: crate::{middleware, model::tool}, std::{collections, sync}
// ============================================================================

//! ## Overview
//! [`Meter`] is the seam; [`InMemoryMeter`] is a reference sink that keeps
//! per-tool counters in a map, useful for tests and simple embedders.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use crate::middleware::Middleware;
use crate::middleware::Next;
use crate::model::identifiers::ToolName;
use crate::model::tool::ToolContext;
use crate::model::tool::ToolHandlerError;

/// Receives a call-outcome increment for one tool.
pub trait Meter: Send + Sync {
    /// Records one call to `tool` that ended in `succeeded`.
    fn increment(&self, tool: &ToolName, succeeded: bool);
}

/// Reference [`Meter`] backed by per-tool success/failure counters.
#[derive(Default)]
pub struct InMemoryMeter {
    counts: Mutex<HashMap<ToolName, (u64, u64)>>,
}

impl InMemoryMeter {
    /// Creates an empty meter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `(successes, failures)` recorded for `tool`.
    #[must_use]
    pub fn counts_for(&self, tool: &ToolName) -> (u64, u64) {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        let guard = self.counts.lock().expect("meter mutex poisoned");
        guard.get(tool).copied().unwrap_or((0, 0))
    }
}

impl Meter for InMemoryMeter {
    fn increment(&self, tool: &ToolName, succeeded: bool) {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        let mut guard = self.counts.lock().expect("meter mutex poisoned");
        let entry = guard.entry(tool.clone()).or_insert((0, 0));
        if succeeded {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
    }
}

/// Middleware that increments a [`Meter`] counter for every call, keyed by
/// the tool name carried in the call's reason-less context via the input's
/// sibling parameter supplied at construction.
pub struct MetricsMiddleware {
    meter: std::sync::Arc<dyn Meter>,
    tool: ToolName,
}

impl MetricsMiddleware {
    /// Builds a metrics layer reporting calls to `tool` against `meter`.
    ///
    /// One [`MetricsMiddleware`] instance is scoped to a single tool because
    /// the tool name is not threaded through [`ToolContext`]; the engine
    /// builds a fresh per-tool chain when invoking each tool.
    #[must_use]
    pub fn new(meter: std::sync::Arc<dyn Meter>, tool: ToolName) -> Self {
        Self { meter, tool }
    }
}

impl Middleware for MetricsMiddleware {
    fn handle(
        &self,
        context: &ToolContext,
        input: &Value,
        next: &Next<'_>,
    ) -> Result<Value, ToolHandlerError> {
        let result = next.call(context, input);
        self.meter.increment(&self.tool, result.is_ok());
        result
    }
}
