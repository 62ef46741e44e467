// runloop-core/src/policy/mod.rs
// ============================================================================
// Module: Policy Layer
// Description: Evaluates eligibility, budgets, approval and rate limits for
//              every candidate tool call, in that fixed order.
// Purpose: The single gate every `CallTool` decision must pass before a
//          handler is invoked.
// Dependencies: crate::model::{identifiers, state, tool}
// ============================================================================

//! ## Overview
//! [`PolicyLayer::check`] runs the four rule sets in order and returns on
//! the first rejection: eligibility, budgets, approval, rate limit. This
//! ordering is load-bearing: an ineligible tool is rejected before its
//! budget is even consulted, and a rate-limit wait is the last thing paid
//! for a call that would otherwise be admitted.

pub mod approval;
pub mod budgets;
pub mod eligibility;
pub mod error;
pub mod ratelimit;

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde_json::Value;

use crate::model::identifiers::BudgetName;
use crate::model::identifiers::RunId;
use crate::model::identifiers::ToolName;
use crate::model::state::Budget;
use crate::model::state::State;
use crate::model::tool::ToolAnnotations;
use crate::policy::approval::ApprovalMode;
use crate::policy::approval::AlwaysApprove;
use crate::policy::approval::Approver;
use crate::policy::eligibility::EligibilityPolicy;
use crate::policy::error::PolicyError;
use crate::policy::ratelimit::RateLimiter;

/// A candidate tool call awaiting policy evaluation.
pub struct CallRequest<'a> {
    /// The run making the call.
    pub run_id: &'a RunId,
    /// The run's current state.
    pub state: State,
    /// The tool being called.
    pub tool: &'a ToolName,
    /// The tool's declared annotations.
    pub annotations: &'a ToolAnnotations,
    /// The proposed input.
    pub input: &'a Value,
    /// Custom budget costs declared by the tool, applied in addition to the
    /// implicit per-call cost.
    pub custom_budgets: &'a BTreeMap<BudgetName, i64>,
    /// Wall-clock deadline (epoch ms) for rate-limit acquisition.
    pub deadline_ms: u64,
}

/// Ties the four policy rule sets together behind a single entry point.
pub struct PolicyLayer {
    /// Which tools are eligible from which states.
    pub eligibility: EligibilityPolicy,
    /// Approval mode and approver consulted for destructive/high-risk calls.
    pub approval_mode: ApprovalMode,
    approver: Box<dyn Approver>,
    /// Rate limiter shared across all tool calls.
    pub rate_limiter: RateLimiter,
    /// Name of the budget implicitly consumed once per call, if configured.
    pub per_call_budget: Option<BudgetName>,
}

impl PolicyLayer {
    /// Builds a policy layer with an always-approving approver and an
    /// unconfigured rate limiter; callers customize via the public fields.
    #[must_use]
    pub fn new(eligibility: EligibilityPolicy) -> Self {
        Self {
            eligibility,
            approval_mode: ApprovalMode::Auto,
            approver: Box::new(AlwaysApprove),
            rate_limiter: RateLimiter::new(),
            per_call_budget: None,
        }
    }

    /// Replaces the configured approver.
    pub fn set_approver(&mut self, approver: Box<dyn Approver>) -> &mut Self {
        self.approver = approver;
        self
    }

    /// Runs the four rule sets in order: eligibility, budgets, approval,
    /// rate limit. Mutates `budgets` in place on success.
    ///
    /// # Errors
    /// Returns the first [`PolicyError`] raised, or a wrapped
    /// [`budgets::BudgetError`] converted by the caller.
    pub fn check(
        &self,
        request: &CallRequest<'_>,
        budgets: &mut BTreeMap<BudgetName, Budget>,
        registered_tools: &BTreeSet<ToolName>,
    ) -> Result<(), CheckError> {
        if !self
            .eligibility
            .is_allowed(request.state, request.tool, registered_tools)
        {
            return Err(CheckError::Policy(PolicyError::Eligibility {
                tool: request.tool.clone(),
                state: request.state,
            }));
        }

        if !request.annotations.read_only && !matches!(request.state, State::Act) {
            return Err(CheckError::Policy(PolicyError::SideEffectOutsideAct {
                tool: request.tool.clone(),
                state: request.state,
            }));
        }

        if let Some(budget_name) = &self.per_call_budget {
            budgets::consume(budgets, budget_name, 1).map_err(CheckError::Budget)?;
        }
        for (name, amount) in request.custom_budgets {
            budgets::consume(budgets, name, *amount).map_err(CheckError::Budget)?;
        }

        let high_risk = matches!(
            request.annotations.risk_level,
            crate::model::tool::RiskLevel::High
        );
        if approval::requires_approval(self.approval_mode, request.annotations.destructive, high_risk)
            && !self.approver.approve(request.run_id, request.tool, request.input)
        {
            return Err(CheckError::Policy(PolicyError::ApprovalRejected {
                tool: request.tool.clone(),
            }));
        }

        if !self.rate_limiter.acquire(request.tool, request.deadline_ms) {
            return Err(CheckError::Policy(PolicyError::RateLimitTimeout {
                tool: request.tool.clone(),
            }));
        }

        Ok(())
    }
}

/// Outcome of a failed [`PolicyLayer::check`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckError {
    /// A non-budget policy rejection.
    #[error(transparent)]
    Policy(#[from] PolicyError),
    /// A budget would have gone negative.
    #[error(transparent)]
    Budget(#[from] budgets::BudgetError),
}

#[cfg(test)]
mod tests {
    use super::CallRequest;
    use super::CheckError;
    use super::PolicyLayer;
    use crate::model::identifiers::RunId;
    use crate::model::identifiers::ToolName;
    use crate::model::state::Budget;
    use crate::model::state::State;
    use crate::model::tool::ToolAnnotations;
    use crate::policy::eligibility::EligibilityPolicy;
    use std::collections::BTreeMap;
    use std::collections::BTreeSet;

    #[test]
    fn rejects_ineligible_tool_before_touching_budgets() {
        let policy = PolicyLayer::new(EligibilityPolicy::new());
        let run_id = RunId::new("run-1");
        let tool = ToolName::new("search");
        let annotations = ToolAnnotations::read_only();
        let input = serde_json::Value::Null;
        let custom_budgets = BTreeMap::new();
        let request = CallRequest {
            run_id: &run_id,
            state: State::Explore,
            tool: &tool,
            annotations: &annotations,
            input: &input,
            custom_budgets: &custom_budgets,
            deadline_ms: 0,
        };
        let mut budgets = BTreeMap::new();
        let registered: BTreeSet<_> = [tool.clone()].into();

        let result = policy.check(&request, &mut budgets, &registered);
        assert!(matches!(result, Err(CheckError::Policy(_))));
    }

    #[test]
    fn rejects_side_effecting_call_outside_act() {
        let mut eligibility = EligibilityPolicy::new();
        eligibility.allow(State::Explore, ToolName::new("write_report"));
        let policy = PolicyLayer::new(eligibility);

        let run_id = RunId::new("run-1");
        let tool = ToolName::new("write_report");
        let annotations = ToolAnnotations::side_effecting();
        let input = serde_json::Value::Null;
        let custom_budgets = BTreeMap::new();
        let request = CallRequest {
            run_id: &run_id,
            state: State::Explore,
            tool: &tool,
            annotations: &annotations,
            input: &input,
            custom_budgets: &custom_budgets,
            deadline_ms: 0,
        };
        let mut budgets = BTreeMap::new();
        let registered: BTreeSet<_> = [tool.clone()].into();

        let result = policy.check(&request, &mut budgets, &registered);
        assert!(matches!(
            result,
            Err(CheckError::Policy(crate::policy::error::PolicyError::SideEffectOutsideAct { .. }))
        ));
    }

    #[test]
    fn admits_eligible_read_only_call_and_consumes_per_call_budget() {
        let mut eligibility = EligibilityPolicy::new();
        eligibility.allow(State::Explore, ToolName::new("search"));
        let mut policy = PolicyLayer::new(eligibility);
        policy.per_call_budget = Some(crate::model::identifiers::BudgetName::new("tool_calls"));

        let run_id = RunId::new("run-1");
        let tool = ToolName::new("search");
        let annotations = ToolAnnotations::read_only();
        let input = serde_json::Value::Null;
        let custom_budgets = BTreeMap::new();
        let request = CallRequest {
            run_id: &run_id,
            state: State::Explore,
            tool: &tool,
            annotations: &annotations,
            input: &input,
            custom_budgets: &custom_budgets,
            deadline_ms: 0,
        };
        let mut budgets = BTreeMap::new();
        budgets.insert(crate::model::identifiers::BudgetName::new("tool_calls"), Budget::new(5));
        let registered: BTreeSet<_> = [tool.clone()].into();

        assert!(policy.check(&request, &mut budgets, &registered).is_ok());
        assert_eq!(budgets[&crate::model::identifiers::BudgetName::new("tool_calls")].consumed, 1);
    }
}
