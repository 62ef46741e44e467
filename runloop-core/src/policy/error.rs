// runloop-core/src/policy/error.rs
// ============================================================================
// Module: Policy Errors
// Description: Errors raised by the eligibility, approval and rate-limit rule sets.
// Purpose: Give every policy rejection a precise, matchable cause.
// Dependencies: crate::model::identifiers, thiserror
// ============================================================================

//! ## Overview
//! Every rejection from the policy layer is a [`PolicyError`], which the
//! engine wraps into `EngineError::PolicyViolation`. Budget exhaustion is
//! modeled separately (see [`crate::policy::budgets`]) since it terminates
//! a run with its own distinct disposition rather than a plain violation.

use crate::model::identifiers::ToolName;
use crate::model::state::State;

/// A rejection raised by the eligibility, approval, validation or rate-limit
/// rule sets.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    /// The tool is not in the `allowed_tools` set for the current state.
    #[error("tool '{tool}' is not eligible in state '{state}'")]
    Eligibility {
        /// The tool that was rejected.
        tool: ToolName,
        /// The state it was rejected in.
        state: State,
    },
    /// A non-read-only tool was invoked outside `act`.
    #[error("tool '{tool}' has side effects and cannot run outside 'act' (current: '{state}')")]
    SideEffectOutsideAct {
        /// The tool that was rejected.
        tool: ToolName,
        /// The state it was rejected in.
        state: State,
    },
    /// The approver rejected a destructive/high-risk call.
    #[error("approval rejected for tool '{tool}'")]
    ApprovalRejected {
        /// The tool whose call was rejected.
        tool: ToolName,
    },
    /// A rate-limit token could not be acquired before the deadline.
    #[error("rate limit timeout for tool '{tool}'")]
    RateLimitTimeout {
        /// The tool whose call timed out.
        tool: ToolName,
    },
    /// The tool's input failed schema or anti-injection validation.
    #[error("validation failed for tool '{tool}': {reason}")]
    ValidationFailed {
        /// The tool whose input failed validation.
        tool: ToolName,
        /// A human-readable reason.
        reason: String,
    },
    /// `AskHuman` was decided but no human-input provider is configured.
    #[error("no human channel configured")]
    NoHumanChannel,
}
