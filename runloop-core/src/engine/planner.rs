// runloop-core/src/engine/planner.rs
// ============================================================================
// Module: Planner Contract
// Description: The pluggable decision-making seam the engine consults once
//              per step.
// Purpose: Keep the engine entirely ignorant of how decisions are produced;
//          it only knows how to execute them.
// Dependencies: crate::model::{decision, identifiers, state}
// ============================================================================

//! ## Overview
//! A [`Planner`] is handed a [`PlannerRequest`] describing everything it is
//! allowed to see (goal, current state, evidence so far, eligible tools)
//! and returns a [`Decision`]. The engine never inspects planner internals
//! and never retries a planner call beyond the three-consecutive-failure
//! rule it enforces at the step-loop level.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::model::decision::Decision;
use crate::model::evidence::EvidenceEntry;
use crate::model::identifiers::RunId;
use crate::model::identifiers::ToolName;
use crate::model::state::State;

/// Everything a planner may consult to produce its next [`Decision`].
pub struct PlannerRequest<'a> {
    /// The run requesting a decision.
    pub run_id: &'a RunId,
    /// The goal stated when the run was started.
    pub goal: &'a str,
    /// The run's current state.
    pub state: State,
    /// The append-only evidence log so far, in insertion order.
    pub evidence: &'a [EvidenceEntry],
    /// Tool names eligible from the current state.
    pub eligible_tools: &'a BTreeSet<ToolName>,
    /// Number of planner decisions already processed this run.
    pub step_count: u64,
    /// Remaining time before the planner must return, best-effort.
    pub deadline: Duration,
}

/// Error returned by a planner invocation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("planner error: {message}")]
pub struct PlannerError {
    /// Human-readable description of why planning failed.
    pub message: String,
}

impl PlannerError {
    /// Builds a planner error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Produces the next [`Decision`] for a run. Implementations must honor
/// `request.deadline` and return promptly if cancelled; the engine does not
/// forcibly interrupt a planner call in progress.
pub trait Planner: Send + Sync {
    /// Computes the next decision for the run described by `request`.
    ///
    /// # Errors
    /// Returns [`PlannerError`] if planning fails; the engine records the
    /// error as evidence and terminates the run after three consecutive
    /// failures.
    fn plan(&self, request: &PlannerRequest<'_>) -> Result<Decision, PlannerError>;
}

/// A planner that always returns the same fixed decision, regardless of
/// state; useful for tests and scripted demos.
pub struct ScriptedPlanner {
    decisions: std::sync::Mutex<std::collections::VecDeque<Decision>>,
}

impl ScriptedPlanner {
    /// Builds a planner that replays `decisions` in order, one per call.
    #[must_use]
    pub fn new(decisions: Vec<Decision>) -> Self {
        Self {
            decisions: std::sync::Mutex::new(decisions.into()),
        }
    }
}

impl Planner for ScriptedPlanner {
    fn plan(&self, _request: &PlannerRequest<'_>) -> Result<Decision, PlannerError> {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        let mut guard = self.decisions.lock().expect("scripted planner mutex poisoned");
        guard
            .pop_front()
            .ok_or_else(|| PlannerError::new("scripted planner exhausted its decision list"))
    }
}

#[cfg(test)]
mod tests {
    use super::Planner as _;
    use super::PlannerRequest;
    use super::ScriptedPlanner;
    use crate::model::decision::Decision;
    use crate::model::identifiers::RunId;
    use crate::model::state::State;
    use std::collections::BTreeSet;
    use std::time::Duration;

    #[test]
    fn scripted_planner_replays_decisions_in_order_then_errors() {
        let planner = ScriptedPlanner::new(vec![Decision::Finish {
            summary: "done".to_string(),
            result: None,
        }]);
        let run_id = RunId::new("run-1");
        let eligible = BTreeSet::new();
        let request = PlannerRequest {
            run_id: &run_id,
            goal: "test",
            state: State::Decide,
            evidence: &[],
            eligible_tools: &eligible,
            step_count: 0,
            deadline: Duration::from_secs(1),
        };

        assert!(planner.plan(&request).is_ok());
        assert!(planner.plan(&request).is_err());
    }
}
