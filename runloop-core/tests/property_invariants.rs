// runloop-core/tests/property_invariants.rs
// ============================================================================
// Module: Property-Based Invariant Tests
// Description: Property tests for the budget counter and run/state invariants.
// Purpose: Detect panics and invariant violations across wide input ranges.
// ============================================================================

//! Property-based tests for invariants that unit tests can only sample.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use proptest::prelude::*;
use runloop_core::Run;
use runloop_core::RunStatus;
use runloop_core::State;
use runloop_core::model::identifiers::RunId;
use runloop_core::model::state::Budget;

proptest! {
    /// A budget's `consumed` total never exceeds its `limit`, and a rejected
    /// `try_consume` never mutates `consumed`, regardless of call sequence.
    #[test]
    fn budget_never_goes_negative(limit in 0i64..10_000, amounts in prop::collection::vec(0i64..2_000, 0..50)) {
        let mut budget = Budget::new(limit);
        for amount in amounts {
            let before = budget.consumed;
            match budget.try_consume(amount) {
                Some(remaining) => {
                    prop_assert_eq!(remaining, budget.remaining());
                    prop_assert!(budget.consumed <= budget.limit);
                }
                None => prop_assert_eq!(budget.consumed, before),
            }
        }
        prop_assert!(budget.consumed <= budget.limit);
    }

    /// Every [`State`] reachable by name round-trips through its canonical
    /// string form.
    #[test]
    fn state_as_str_round_trips_through_display(seed in 0u8..7) {
        let state = match seed {
            0 => State::Intake,
            1 => State::Explore,
            2 => State::Decide,
            3 => State::Act,
            4 => State::Validate,
            5 => State::Done,
            _ => State::Failed,
        };
        prop_assert_eq!(state.to_string(), state.as_str());
        prop_assert_eq!(state.is_terminal(), matches!(state, State::Done | State::Failed));
    }

    /// A fresh [`Run`] always starts non-terminal with its status and state
    /// in lockstep, no matter the goal text or creation timestamp.
    #[test]
    fn fresh_run_starts_non_terminal(goal in ".*", now_ms in 0u64..u64::MAX) {
        let run = Run::new(RunId::new("run-1"), goal, now_ms, std::collections::BTreeMap::new());
        prop_assert_eq!(run.current_state, State::Intake);
        prop_assert_eq!(run.status, RunStatus::Running);
        prop_assert!(run.status_matches_terminal_state());
    }
}
