// runloop-core/src/model/decision.rs
// ============================================================================
// Module: Planner Decision
// Description: The tagged union a planner returns at each step.
// Purpose: Make "exactly one action per step" a type-level invariant.
// Dependencies: crate::model::state, serde, serde_json
// ============================================================================

//! ## Overview
//! The source models a decision as a struct of five optional pointers; here
//! it is an explicit tagged enum so exactly one variant can ever be inhabited.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::model::state::State;

/// The action a planner chooses at one engine step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    /// Invoke a registered tool.
    CallTool {
        /// Name of the tool to invoke.
        name: String,
        /// Input bytes for the tool, carried as JSON.
        input: Value,
        /// The planner's stated reason for this call.
        reason: String,
    },
    /// Move to a different state within the fixed alphabet.
    Transition {
        /// The state to move to.
        target_state: State,
        /// The planner's stated reason for this transition.
        reason: String,
    },
    /// Ask a human a question and block for their answer.
    AskHuman {
        /// The question to pose.
        question: String,
        /// Optional multiple-choice options.
        options: Option<Vec<String>>,
    },
    /// End the run successfully.
    Finish {
        /// A human-readable summary.
        summary: String,
        /// An optional structured result payload.
        result: Option<Value>,
    },
    /// End the run with an error.
    Fail {
        /// A human-readable reason.
        reason: String,
        /// An optional structured error payload.
        error: Option<Value>,
    },
}

impl Decision {
    /// Returns a short machine-readable tag for logging/metrics.
    #[must_use]
    pub const fn kind_str(&self) -> &'static str {
        match self {
            Self::CallTool {
                ..
            } => "call_tool",
            Self::Transition {
                ..
            } => "transition",
            Self::AskHuman {
                ..
            } => "ask_human",
            Self::Finish {
                ..
            } => "finish",
            Self::Fail {
                ..
            } => "fail",
        }
    }
}

/// The outcome of advancing a run by exactly one planner decision, returned
/// from the engine's `step` introspection surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionOutcome {
    /// A tool was invoked; `evidence_index` points at the resulting entry.
    ToolCalled {
        /// Name of the tool that was invoked.
        tool: String,
        /// Index of the appended evidence entry.
        evidence_index: usize,
    },
    /// The run moved to a new state.
    Transitioned {
        /// The state the run moved from.
        from: State,
        /// The state the run moved to.
        to: State,
    },
    /// A human was asked a question and answered.
    HumanAnswered {
        /// Index of the appended evidence entry.
        evidence_index: usize,
    },
    /// The run completed successfully.
    Finished {
        /// The final result payload, if any.
        result: Option<Value>,
    },
    /// The run failed.
    Failed {
        /// The human-readable failure reason.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::Decision;
    use serde_json::json;

    #[test]
    fn kind_str_identifies_the_inhabited_variant() {
        let decision = Decision::CallTool {
            name: "echo".to_string(),
            input: json!({"msg": "hi"}),
            reason: "testing".to_string(),
        };
        assert_eq!(decision.kind_str(), "call_tool");

        let decision = Decision::Fail {
            reason: "bad".to_string(),
            error: None,
        };
        assert_eq!(decision.kind_str(), "fail");
    }
}
