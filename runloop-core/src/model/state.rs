// runloop-core/src/model/state.rs
// ============================================================================
// Module: Run State Machine
// Description: The fixed state alphabet and the Run entity that tracks it.
// Purpose: Define the run's lifecycle and its terminal/side-effect semantics.
// Dependencies: crate::model::{evidence, hashing, identifiers}, serde, serde_json
// ============================================================================

//! ## Overview
//! A run advances through a fixed alphabet of states. Only `act` permits
//! tools with side effects; `done` and `failed` are terminal.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::model::evidence::EvidenceEntry;
use crate::model::identifiers::BudgetName;
use crate::model::identifiers::RunId;

/// One state in the fixed run alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// Initial state; the only valid starting point for a run.
    Intake,
    /// Gathering information before a decision is made.
    Explore,
    /// Choosing the next action.
    Decide,
    /// The only state permitting tools with side effects.
    Act,
    /// Checking the result of a prior action.
    Validate,
    /// Terminal: the run finished successfully.
    Done,
    /// Terminal: the run finished with an error.
    Failed,
}

impl State {
    /// Returns true if this state is terminal (`done` or `failed`).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if tools with side effects may be invoked from this state.
    #[must_use]
    pub const fn permits_side_effects(self) -> bool {
        matches!(self, Self::Act)
    }

    /// Returns the canonical lowercase name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Intake => "intake",
            Self::Explore => "explore",
            Self::Decide => "decide",
            Self::Act => "act",
            Self::Validate => "validate",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Overall disposition of a run, kept in lockstep with its current [`State`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The run is still advancing through non-terminal states.
    Running,
    /// The run reached `done` via `Finish`.
    Completed,
    /// The run reached `failed` via `Fail` or a terminating error.
    Failed,
    /// The run was stopped by a cancellation signal.
    Cancelled,
}

impl RunStatus {
    /// Returns true if this status corresponds to a terminal run state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// A single named budget counter with an integer limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    /// Maximum number of units this budget may ever consume.
    pub limit: i64,
    /// Units consumed so far.
    pub consumed: i64,
}

impl Budget {
    /// Creates a new budget with the given limit and zero consumption.
    #[must_use]
    pub const fn new(limit: i64) -> Self {
        Self {
            limit,
            consumed: 0,
        }
    }

    /// Units still available before this budget is exhausted.
    #[must_use]
    pub const fn remaining(&self) -> i64 {
        self.limit - self.consumed
    }

    /// Attempts to consume `amount` units, returning the new remaining value.
    ///
    /// Returns `None` if consuming `amount` would drive `remaining()` below zero;
    /// the budget is left unchanged in that case.
    #[must_use]
    pub fn try_consume(&mut self, amount: i64) -> Option<i64> {
        let remaining = self.remaining() - amount;
        if remaining < 0 {
            return None;
        }
        self.consumed += amount;
        Some(remaining)
    }
}

/// The full state of one run: identity, lifecycle, evidence and budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Unique identifier for this run.
    pub run_id: RunId,
    /// The goal the planner is working toward.
    pub goal: String,
    /// Unix-epoch milliseconds at creation.
    pub created_at_ms: u64,
    /// Unix-epoch milliseconds at last mutation.
    pub updated_at_ms: u64,
    /// Current position in the state alphabet.
    pub current_state: State,
    /// Overall disposition; terminal iff `current_state` is terminal.
    pub status: RunStatus,
    /// Number of planner decisions processed so far.
    pub step_count: u64,
    /// Named budget counters and their current consumption.
    pub budgets: BTreeMap<BudgetName, Budget>,
    /// Append-only evidence log, strictly insertion-ordered.
    pub evidence: Vec<EvidenceEntry>,
    /// Final result payload, set only when `status == Completed`.
    pub result: Option<Value>,
    /// Single-line human-readable failure reason, set only on failure.
    pub error: Option<String>,
}

impl Run {
    /// Creates a fresh run in `intake` with empty evidence and the given budgets.
    #[must_use]
    pub fn new(
        run_id: RunId,
        goal: impl Into<String>,
        now_ms: u64,
        budgets: BTreeMap<BudgetName, Budget>,
    ) -> Self {
        Self {
            run_id,
            goal: goal.into(),
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
            current_state: State::Intake,
            status: RunStatus::Running,
            step_count: 0,
            budgets,
            evidence: Vec::new(),
            result: None,
            error: None,
        }
    }

    /// Returns true iff `status` and `current_state` agree on termination,
    /// the run-level invariant asserted by the testable properties.
    #[must_use]
    pub fn status_matches_terminal_state(&self) -> bool {
        self.status.is_terminal() == self.current_state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::Budget;
    use super::State;

    #[test]
    fn act_is_the_only_side_effect_state() {
        for state in [
            State::Intake,
            State::Explore,
            State::Decide,
            State::Validate,
            State::Done,
            State::Failed,
        ] {
            assert!(!state.permits_side_effects());
        }
        assert!(State::Act.permits_side_effects());
    }

    #[test]
    fn done_and_failed_are_terminal() {
        assert!(State::Done.is_terminal());
        assert!(State::Failed.is_terminal());
        assert!(!State::Act.is_terminal());
    }

    #[test]
    fn budget_refuses_to_go_negative() {
        let mut budget = Budget::new(2);
        assert_eq!(budget.try_consume(1), Some(1));
        assert_eq!(budget.try_consume(1), Some(0));
        assert_eq!(budget.try_consume(1), None);
        assert_eq!(budget.consumed, 2, "rejected consume must not mutate state");
    }
}
