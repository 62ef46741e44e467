// runloop-core/src/policy/approval.rs
// ============================================================================
// Module: Approval Policy
// Description: Gates destructive/high-risk tool calls behind an approver.
// Purpose: Third rule set evaluated each policy check, after budgets.
// Dependencies: crate::model::{identifiers, tool}, serde_json
// ============================================================================

//! ## Overview
//! In `auto` mode every call is approved without consulting the approver. In
//! `require` mode, destructive or high-risk calls are routed to an
//! interactive [`Approver`]; a rejection is a policy violation.

use serde_json::Value;

use crate::model::identifiers::RunId;
use crate::model::identifiers::ToolName;

/// When approval is required for destructive/high-risk tool calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApprovalMode {
    /// Every call is approved automatically.
    #[default]
    Auto,
    /// Destructive or high-risk calls are routed to the configured approver.
    Require,
}

/// Interactive approver consulted in `require` mode.
pub trait Approver: Send + Sync {
    /// Decides whether `tool` may be invoked with `input` for `run_id`.
    fn approve(&self, run_id: &RunId, tool: &ToolName, input: &Value) -> bool;
}

/// An approver that always approves; used when no embedder-supplied
/// approver is configured but `require` mode is still set.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysApprove;

impl Approver for AlwaysApprove {
    fn approve(&self, _run_id: &RunId, _tool: &ToolName, _input: &Value) -> bool {
        true
    }
}

/// Decides whether `tool` (with the given destructive/high-risk flags)
/// requires the approver to be consulted in the current `mode`.
#[must_use]
pub fn requires_approval(mode: ApprovalMode, destructive: bool, high_risk: bool) -> bool {
    matches!(mode, ApprovalMode::Require) && (destructive || high_risk)
}

#[cfg(test)]
mod tests {
    use super::ApprovalMode;
    use super::requires_approval;

    #[test]
    fn auto_mode_never_requires_approval() {
        assert!(!requires_approval(ApprovalMode::Auto, true, true));
    }

    #[test]
    fn require_mode_only_gates_destructive_or_high_risk() {
        assert!(requires_approval(ApprovalMode::Require, true, false));
        assert!(requires_approval(ApprovalMode::Require, false, true));
        assert!(!requires_approval(ApprovalMode::Require, false, false));
    }
}
