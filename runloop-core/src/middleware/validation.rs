// runloop-core/src/middleware/validation.rs
// ============================================================================
// Module: Validation Middleware
// Description: Rejects tool input that fails schema or anti-injection checks
//              before the handler ever sees it.
// Purpose: Keep malformed or adversarial planner output from reaching a
//          tool handler.
// Dependencies: crate::{middleware, model::tool}, jsonschema
// ============================================================================

//! ## Overview
//! Two independent checks run before delegating to `next`: an optional JSON
//! Schema check against the tool's declared `input_schema`, and a set of
//! anti-injection heuristics scanning every string leaf of the input for
//! SQL, path-traversal and shell-metacharacter patterns. Either failing is
//! a [`ToolHandlerError`], never a panic.

use jsonschema::JSONSchema;
use serde_json::Value;

use crate::middleware::Middleware;
use crate::middleware::Next;
use crate::model::tool::ToolContext;
use crate::model::tool::ToolHandlerError;

/// Anti-injection heuristics applied to every string leaf of a tool input.
const SUSPICIOUS_PATTERNS: &[&str] = &[
    "../",
    "..\\",
    "; rm ",
    "| rm ",
    "&& rm ",
    "`",
    "$(",
    "' OR '1'='1",
    "\" OR \"1\"=\"1",
    "UNION SELECT",
    "DROP TABLE",
];

/// Middleware that validates input against a compiled JSON Schema and a set
/// of anti-injection heuristics before calling `next`.
pub struct ValidationMiddleware {
    schema: Option<JSONSchema>,
    reject_suspicious_strings: bool,
}

impl ValidationMiddleware {
    /// Builds a validator with no schema; only anti-injection scanning runs.
    #[must_use]
    pub fn new() -> Self {
        Self {
            schema: None,
            reject_suspicious_strings: true,
        }
    }

    /// Compiles `schema` and uses it to validate every input.
    ///
    /// # Errors
    /// Returns the schema compilation error as a string if `schema` is not a
    /// valid JSON Schema document.
    pub fn with_schema(schema: &Value) -> Result<Self, String> {
        let compiled = JSONSchema::compile(schema).map_err(|error| error.to_string())?;
        Ok(Self {
            schema: Some(compiled),
            reject_suspicious_strings: true,
        })
    }

    /// Disables the anti-injection heuristic scan, keeping only schema
    /// validation. Used for tools whose inputs legitimately contain
    /// characters the heuristics flag (e.g. a tool that runs SQL itself).
    #[must_use]
    pub fn without_injection_scan(mut self) -> Self {
        self.reject_suspicious_strings = false;
        self
    }
}

impl Default for ValidationMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

fn scan_for_suspicious_strings(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => SUSPICIOUS_PATTERNS
            .iter()
            .find(|pattern| text.contains(*pattern))
            .map(|pattern| format!("input contains suspicious pattern: {pattern}")),
        Value::Array(items) => items.iter().find_map(scan_for_suspicious_strings),
        Value::Object(fields) => fields.values().find_map(scan_for_suspicious_strings),
        Value::Null | Value::Bool(_) | Value::Number(_) => None,
    }
}

impl Middleware for ValidationMiddleware {
    fn handle(
        &self,
        context: &ToolContext,
        input: &Value,
        next: &Next<'_>,
    ) -> Result<Value, ToolHandlerError> {
        if let Some(schema) = &self.schema {
            if let Err(mut errors) = schema.validate(input) {
                let reason = errors
                    .next()
                    .map(|error| error.to_string())
                    .unwrap_or_else(|| "input did not match schema".to_string());
                return Err(ToolHandlerError::new(format!("schema validation failed: {reason}")));
            }
        }

        if self.reject_suspicious_strings {
            if let Some(reason) = scan_for_suspicious_strings(input) {
                return Err(ToolHandlerError::new(reason));
            }
        }

        next.call(context, input)
    }
}

#[cfg(test)]
mod tests {
    use super::ValidationMiddleware;
    use crate::middleware::MiddlewareChain;
    use crate::model::identifiers::RunId;
    use crate::model::state::State;
    use crate::model::tool::ToolContext;
    use serde_json::json;
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
    fn rejects_path_traversal_in_a_nested_field() {
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(ValidationMiddleware::new()));

        let input = json!({"path": "../../etc/passwd"});
        let result = chain.run(&test_context(), &input, &|_ctx, value| Ok(value.clone()));

        assert!(result.is_err());
    }

    #[test]
    fn admits_clean_input() {
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(ValidationMiddleware::new()));

        let input = json!({"query": "weather in paris"});
        let result = chain.run(&test_context(), &input, &|_ctx, value| Ok(value.clone()));

        assert!(result.is_ok());
    }

    #[test]
    fn enforces_a_compiled_schema() {
        let schema = json!({"type": "object", "required": ["query"]});
        #[allow(clippy::unwrap_used, reason = "schema is a fixed literal known to compile")]
        let validator = ValidationMiddleware::with_schema(&schema).unwrap();
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(validator));

        let result = chain.run(&test_context(), &json!({}), &|_ctx, value| Ok(value.clone()));

        assert!(result.is_err());
    }
}
