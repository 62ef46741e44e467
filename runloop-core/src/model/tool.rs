// runloop-core/src/model/tool.rs
// ============================================================================
// Module: Tool Contract
// Description: The capability contract the engine invokes from the act state.
// Purpose: Decouple the engine from any concrete tool implementation.
// Dependencies: crate::model::identifiers, serde, serde_json, std::collections
// ============================================================================

//! ## Overview
//! A [`Tool`] pairs a name and a fixed set of declarative annotations with a
//! handler closure. The engine only ever sees this contract; concrete tools
//! (file IO, HTTP, etc.) are external collaborators.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::model::identifiers::RunId;
use crate::model::identifiers::ToolName;
use crate::model::state::State;

/// Declarative risk classification for a tool, consulted by the approval
/// policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Safe to run without operator confirmation.
    Low,
    /// Worth logging closely but not worth blocking on.
    Medium,
    /// Requires operator approval when the policy is in `require` mode.
    High,
}

/// Fixed set of declarative flags describing a tool's behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolAnnotations {
    /// True if the tool never produces a side effect.
    pub read_only: bool,
    /// True if invoking the tool can destroy data or state.
    pub destructive: bool,
    /// True if repeated identical invocations are safe.
    pub idempotent: bool,
    /// True if results may be cached by call signature.
    pub cacheable: bool,
    /// Risk classification consulted by the approval policy.
    pub risk_level: RiskLevel,
    /// If true, a handler error terminates the run instead of being
    /// recorded and continuing. Rare; defaults to `false`.
    pub fail_on_error: bool,
}

impl ToolAnnotations {
    /// Annotations for a safe, read-only, idempotent, cacheable, low-risk tool.
    #[must_use]
    pub const fn read_only() -> Self {
        Self {
            read_only: true,
            destructive: false,
            idempotent: true,
            cacheable: true,
            risk_level: RiskLevel::Low,
            fail_on_error: false,
        }
    }

    /// Annotations for a side-effecting tool that is not destructive.
    #[must_use]
    pub const fn side_effecting() -> Self {
        Self {
            read_only: false,
            destructive: false,
            idempotent: false,
            cacheable: false,
            risk_level: RiskLevel::Medium,
            fail_on_error: false,
        }
    }

    /// Annotations for a destructive, high-risk tool.
    #[must_use]
    pub const fn destructive() -> Self {
        Self {
            read_only: false,
            destructive: true,
            idempotent: false,
            cacheable: false,
            risk_level: RiskLevel::High,
            fail_on_error: false,
        }
    }
}

/// Context passed to a tool handler for one invocation.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// The run invoking the tool.
    pub run_id: RunId,
    /// The run's current state at the time of invocation.
    pub state: State,
    /// The planner's stated reason for the call.
    pub reason: String,
    /// Deadline for the call, as Unix-epoch milliseconds.
    pub deadline_ms: u64,
}

/// Error returned by a tool handler.
#[derive(Debug, Clone, thiserror::Error)]
#[error("tool error: {message}")]
pub struct ToolHandlerError {
    /// Human-readable error message.
    pub message: String,
    /// Optional structured error payload to record as evidence.
    pub detail: Option<Value>,
}

impl ToolHandlerError {
    /// Builds a handler error with no structured detail.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }
}

/// A tool handler: synchronous input bytes in, result bytes or error out.
///
/// Handlers run inside the middleware chain and must honor
/// `context.deadline_ms`.
pub type ToolHandler =
    Arc<dyn Fn(&ToolContext, &Value) -> Result<Value, ToolHandlerError> + Send + Sync>;

/// A named capability the engine may invoke from `act` (or from any state,
/// if `read_only`).
#[derive(Clone)]
pub struct Tool {
    /// Unique name, also the key used by eligibility and rate limiting.
    pub name: ToolName,
    /// Human-readable description surfaced to planners.
    pub description: String,
    /// Declarative behavior flags.
    pub annotations: ToolAnnotations,
    /// Optional JSON Schema the input must satisfy; `None` accepts any JSON.
    pub input_schema: Option<Value>,
    /// Custom budgets (beyond `tool_calls`) this tool consumes per call.
    pub custom_budgets: BTreeMap<crate::model::identifiers::BudgetName, i64>,
    /// The handler invoked through the middleware chain.
    pub handler: ToolHandler,
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Tool")
            .field("name", &self.name)
            .field("annotations", &self.annotations)
            .finish_non_exhaustive()
    }
}

/// Read-mostly collection of tools, closed once the engine is constructed.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<ToolName, Tool>,
}

/// Error raised while building a [`ToolRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolRegistryError {
    /// Two tools were registered under the same name.
    #[error("duplicate tool name: {0}")]
    DuplicateName(String),
    /// A tool was registered with an empty name.
    #[error("tool name must not be empty")]
    EmptyName,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool, rejecting duplicate or empty names.
    ///
    /// # Errors
    /// Returns [`ToolRegistryError`] if `tool.name` is empty or already
    /// registered.
    pub fn register(&mut self, tool: Tool) -> Result<(), ToolRegistryError> {
        if tool.name.as_str().is_empty() {
            return Err(ToolRegistryError::EmptyName);
        }
        if self.tools.contains_key(&tool.name) {
            return Err(ToolRegistryError::DuplicateName(tool.name.as_str().to_string()));
        }
        self.tools.insert(tool.name.clone(), tool);
        Ok(())
    }

    /// Looks up a tool by name.
    #[must_use]
    pub fn get(&self, name: &ToolName) -> Option<&Tool> {
        self.tools.get(name)
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns true if no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Iterates over all registered tools.
    pub fn iter(&self) -> impl Iterator<Item = &Tool> {
        self.tools.values()
    }
}

#[cfg(test)]
mod tests {
    use super::Tool;
    use super::ToolAnnotations;
    use super::ToolRegistry;
    use super::ToolRegistryError;
    use crate::model::identifiers::ToolName;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn noop_tool(name: &str) -> Tool {
        Tool {
            name: ToolName::new(name),
            description: "test tool".to_string(),
            annotations: ToolAnnotations::read_only(),
            input_schema: None,
            custom_budgets: BTreeMap::new(),
            handler: Arc::new(|_ctx, input| Ok(input.clone())),
        }
    }

    #[test]
    fn rejects_duplicate_registration() {
        let mut registry = ToolRegistry::new();
        assert!(registry.register(noop_tool("echo")).is_ok());
        assert_eq!(
            registry.register(noop_tool("echo")),
            Err(ToolRegistryError::DuplicateName("echo".to_string()))
        );
    }

    #[test]
    fn rejects_empty_name() {
        let mut registry = ToolRegistry::new();
        assert_eq!(registry.register(noop_tool("")), Err(ToolRegistryError::EmptyName));
    }
}
