// runloop-core/src/engine/error.rs
// ============================================================================
// Module: Engine Errors
// Description: The engine's unified error type, composed from every
//              subsystem's own error via `#[from]`.
// Purpose: Give callers of `Engine::step`/`Engine::run` one error type to
//          match on while keeping each subsystem's error precise.
// Dependencies: crate::{model::tool, policy}, thiserror
// ============================================================================

//! ## Overview
//! [`EngineError`] distinguishes the three terminal dispositions the step
//! loop can reach: a policy violation, budget exhaustion, and the max-steps
//! guard, plus the two non-terminal-but-reported cases (planner and tool
//! errors) and cancellation.

use crate::model::identifiers::RunId;
use crate::model::tool::ToolHandlerError;
use crate::policy::budgets::BudgetError;
use crate::policy::error::PolicyError;

/// Every way a run can end or a step can fail.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// The planner returned an error; recorded as evidence. The engine
    /// terminates the run only after three consecutive planner errors.
    #[error("planner error: {0}")]
    Planner(String),
    /// A tool handler returned an error; recorded as evidence, the run
    /// continues unless the tool's annotations set `fail_on_error`.
    #[error(transparent)]
    Tool(#[from] ToolHandlerError),
    /// A policy rule set rejected the candidate call.
    #[error(transparent)]
    Policy(#[from] PolicyError),
    /// A budget would have gone negative.
    #[error(transparent)]
    Budget(#[from] BudgetError),
    /// The run exceeded its configured maximum step count.
    #[error("run {run_id} exceeded the maximum step count ({max_steps})")]
    MaxStepsExceeded {
        /// The run that was stopped.
        run_id: RunId,
        /// The configured ceiling.
        max_steps: u64,
    },
    /// The run was stopped by an external cancellation signal.
    #[error("run {0} was cancelled")]
    Cancelled(RunId),
    /// Three consecutive planner errors terminated the run.
    #[error("run {0} failed after three consecutive planner errors")]
    PlannerExhausted(RunId),
    /// `AskHuman` was decided but no human-input provider is configured.
    #[error("no human channel configured for run {0}")]
    NoHumanChannel(RunId),
    /// The requested run id is unknown to the configured store.
    #[error("unknown run: {0}")]
    UnknownRun(RunId),
    /// A decision named a tool that is not registered.
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    /// A decision named a transition target outside the fixed state alphabet
    /// reachable from the current state.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// The state the run was in.
        from: String,
        /// The state the planner requested.
        to: String,
    },
    /// The configured run store failed to read or write.
    #[error("run store error: {0}")]
    Store(String),
}
