// runloop-core/tests/engine_end_to_end.rs
// ============================================================================
// Module: Engine End-to-End Scenarios
// Description: Drives `Engine::run` through success, eligibility rejection
//              and budget exhaustion using a scripted planner.
// Purpose: Exercise the full policy-plus-middleware path the unit tests in
//          each subsystem module cannot see from the outside.
// ============================================================================

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeMap;
use std::sync::Arc;

use runloop_core::engine::InMemoryRunStore;
use runloop_core::engine::ScriptedPlanner;
use runloop_core::model::identifiers::BudgetName;
use runloop_core::model::identifiers::ToolName;
use runloop_core::policy::eligibility::EligibilityPolicy;
use runloop_core::Decision;
use runloop_core::Engine;
use runloop_core::EngineConfig;
use runloop_core::EngineError;
use runloop_core::PolicyLayer;
use runloop_core::RunStatus;
use runloop_core::RunStore;
use runloop_core::State;
use runloop_core::Tool;
use runloop_core::ToolAnnotations;
use runloop_core::ToolRegistry;
use runloop_core::model::evidence::EvidenceKind;
use runloop_core::model::identifiers::RunId;

fn echo_tool(name: &str, annotations: ToolAnnotations) -> Tool {
    Tool {
        name: ToolName::new(name),
        description: "Echoes its input back as output.".to_string(),
        annotations,
        input_schema: None,
        custom_budgets: BTreeMap::new(),
        handler: Arc::new(|_context, input| Ok(input.clone())),
    }
}

fn registry_with(tools: Vec<Tool>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register(tool).expect("distinct tool names");
    }
    registry
}

#[test]
fn scripted_run_reaches_done_and_persists_evidence() {
    let mut eligibility = EligibilityPolicy::new();
    eligibility.allow(State::Act, ToolName::new("echo"));
    let policy = PolicyLayer::new(eligibility);

    let tools = registry_with(vec![echo_tool("echo", ToolAnnotations::side_effecting())]);
    let planner = ScriptedPlanner::new(vec![
        Decision::Transition {
            target_state: State::Act,
            reason: "go straight to act".to_string(),
        },
        Decision::CallTool {
            name: "echo".to_string(),
            input: serde_json::json!({"value": 1}),
            reason: "record one fact".to_string(),
        },
        Decision::Finish {
            summary: "done".to_string(),
            result: Some(serde_json::json!({"value": 1})),
        },
    ]);

    let engine = Engine::new(planner, tools, InMemoryRunStore::new(), policy, EngineConfig::new(10))
        .expect("valid engine");
    let run = engine.run("trivial goal", 1_000).expect("run completes");

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.current_state, State::Done);
    assert!(run.status_matches_terminal_state());
    assert_eq!(run.result, Some(serde_json::json!({"value": 1})));
    assert!(run.evidence.len() >= 3, "expected a start note, a tool result and a finish note");
}

#[test]
fn tool_call_outside_its_eligible_state_is_rejected() {
    let mut eligibility = EligibilityPolicy::new();
    eligibility.allow(State::Act, ToolName::new("echo"));
    let policy = PolicyLayer::new(eligibility);

    let tools = registry_with(vec![echo_tool("echo", ToolAnnotations::side_effecting())]);
    let planner = ScriptedPlanner::new(vec![Decision::CallTool {
        name: "echo".to_string(),
        input: serde_json::json!({}),
        reason: "call too early, still in intake".to_string(),
    }]);

    let engine = Engine::new(planner, tools, InMemoryRunStore::new(), policy, EngineConfig::new(10))
        .expect("valid engine");
    let error = engine.run("ineligible call", 0).expect_err("policy rejects the call");

    assert!(matches!(error, EngineError::Policy(_)), "expected a policy rejection, got {error:?}");
}

#[test]
fn exhausted_per_call_budget_terminates_the_run() {
    let mut eligibility = EligibilityPolicy::new();
    eligibility.allow_all(State::Act);
    let mut policy = PolicyLayer::new(eligibility);
    policy.per_call_budget = Some(BudgetName::new("tool_calls"));

    let tools = registry_with(vec![echo_tool("echo", ToolAnnotations::side_effecting())]);
    let planner = ScriptedPlanner::new(vec![
        Decision::Transition {
            target_state: State::Act,
            reason: "go to act".to_string(),
        },
        Decision::CallTool {
            name: "echo".to_string(),
            input: serde_json::json!({}),
            reason: "first call, within budget".to_string(),
        },
        Decision::CallTool {
            name: "echo".to_string(),
            input: serde_json::json!({}),
            reason: "second call, budget already spent".to_string(),
        },
    ]);

    let config = EngineConfig::new(10).with_budget(BudgetName::new("tool_calls"), 1);
    let engine = Engine::new(planner, tools, InMemoryRunStore::new(), policy, config).expect("valid engine");
    let error = engine.run("budget exhaustion", 0).expect_err("budget rejects the second call");

    assert!(matches!(error, EngineError::Budget(_)), "expected a budget rejection, got {error:?}");
}

#[test]
fn planner_exhaustion_after_repeated_errors_fails_the_run() {
    let tools = registry_with(vec![]);
    let eligibility = EligibilityPolicy::new();
    let policy = PolicyLayer::new(eligibility);
    let planner = ScriptedPlanner::new(vec![]);

    let engine = Engine::new(planner, tools, InMemoryRunStore::new(), policy, EngineConfig::new(10))
        .expect("valid engine");
    let error = engine.run("empty script", 0).expect_err("planner runs dry immediately");

    assert!(matches!(error, EngineError::PlannerExhausted(_)), "expected planner exhaustion, got {error:?}");
}

#[test]
fn max_step_ceiling_fails_a_run_that_never_finishes() {
    let mut eligibility = EligibilityPolicy::new();
    eligibility.allow_all(State::Explore);
    let policy = PolicyLayer::new(eligibility);

    let tools = registry_with(vec![]);
    let looping_script = vec![
        Decision::Transition {
            target_state: State::Explore,
            reason: "stay put".to_string(),
        },
        Decision::Transition {
            target_state: State::Explore,
            reason: "stay put again".to_string(),
        },
    ];
    let planner = ScriptedPlanner::new(looping_script);

    let engine = Engine::new(planner, tools, InMemoryRunStore::new(), policy, EngineConfig::new(2))
        .expect("valid engine");
    let error = engine.run("never finishes", 0).expect_err("max steps trips first");

    assert!(matches!(error, EngineError::MaxStepsExceeded { .. }), "expected the step ceiling, got {error:?}");
}

#[test]
fn unknown_tool_call_records_evidence_before_failing_the_run() {
    let mut eligibility = EligibilityPolicy::new();
    eligibility.allow_all(State::Act);
    let policy = PolicyLayer::new(eligibility);

    let tools = registry_with(vec![]);
    let planner = ScriptedPlanner::new(vec![
        Decision::Transition {
            target_state: State::Act,
            reason: "go to act".to_string(),
        },
        Decision::CallTool {
            name: "does_not_exist".to_string(),
            input: serde_json::json!({}),
            reason: "call a tool nobody registered".to_string(),
        },
    ]);

    let store = runloop_core::engine::SharedRunStore::new(Arc::new(InMemoryRunStore::new()));
    let engine = Engine::new(planner, tools, store.clone(), policy, EngineConfig::new(10))
        .expect("valid engine");
    let error = engine.run("unknown tool", 0).expect_err("unknown tool rejects the call");
    assert!(matches!(error, EngineError::UnknownTool(_)), "expected an unknown-tool error, got {error:?}");

    let run = store.get(&RunId::new("run-0")).expect("run was persisted before the error was returned");
    assert_eq!(run.status, RunStatus::Failed);
    assert!(
        run.evidence
            .iter()
            .any(|entry| matches!(entry.kind, EvidenceKind::SystemNote) && entry.content["event"] == "failed"),
        "expected a system_note evidence entry recording the termination reason"
    );
}
