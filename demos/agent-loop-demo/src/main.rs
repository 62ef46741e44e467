// demos/agent-loop-demo/src/main.rs
// ============================================================================
// Binary: Agent Loop Demo
// Description: Wires a scripted planner, a small tool registry and a
//              dispatcher worker together to drive one run end to end.
// Purpose: A runnable reference for embedders: what minimal wiring looks
//          like to go from "nothing" to a completed run.
// Dependencies: runloop_core, runloop_dispatch, serde_json
// ============================================================================

//! Runs a two-tool research scenario to completion, then replays the same
//! `write_report` call through the dispatcher instead of the engine's own
//! middleware chain, to show both execution paths against one tool registry.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use runloop_core::engine::InMemoryRunStore;
use runloop_core::engine::ScriptedPlanner;
use runloop_core::policy::eligibility::EligibilityPolicy;
use runloop_core::Decision;
use runloop_core::Engine;
use runloop_core::EngineConfig;
use runloop_core::PolicyLayer;
use runloop_core::State;
use runloop_core::Tool;
use runloop_core::ToolAnnotations;
use runloop_core::ToolRegistry;
use runloop_core::model::identifiers::BudgetName;
use runloop_core::model::identifiers::HolderId;
use runloop_core::model::identifiers::RunId;
use runloop_core::model::identifiers::TaskId;
use runloop_core::model::identifiers::ToolName;
use runloop_dispatch::InMemoryLock;
use runloop_dispatch::InMemoryQueue;
use runloop_dispatch::Queue;
use runloop_dispatch::Task;
use runloop_dispatch::Worker;
use runloop_dispatch::WorkerConfig;

/// Wraps any failure this demo can produce behind one `std::error::Error` type.
#[derive(Debug)]
struct DemoError(String);

impl std::fmt::Display for DemoError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl std::error::Error for DemoError {}

impl From<runloop_core::model::tool::ToolRegistryError> for DemoError {
    fn from(error: runloop_core::model::tool::ToolRegistryError) -> Self {
        Self(error.to_string())
    }
}

impl From<runloop_core::engine::engine::EngineBuildError> for DemoError {
    fn from(error: runloop_core::engine::engine::EngineBuildError) -> Self {
        Self(error.to_string())
    }
}

impl From<runloop_core::engine::error::EngineError> for DemoError {
    fn from(error: runloop_core::engine::error::EngineError) -> Self {
        Self(error.to_string())
    }
}

impl From<runloop_dispatch::QueueError> for DemoError {
    fn from(error: runloop_dispatch::QueueError) -> Self {
        Self(error.to_string())
    }
}

impl From<std::io::Error> for DemoError {
    fn from(error: std::io::Error) -> Self {
        Self(error.to_string())
    }
}

/// Writes a labeled line to stdout.
fn write_line(label: &str, value: &str) -> Result<(), std::io::Error> {
    let mut out = std::io::stdout();
    writeln!(out, "{label}: {value}")?;
    Ok(())
}

/// Builds the two-tool registry shared by both the engine and the dispatcher:
/// a read-only search tool eligible from `explore`, and a side-effecting
/// report writer eligible only from `act`.
fn build_tools() -> Result<ToolRegistry, DemoError> {
    let mut registry = ToolRegistry::new();

    registry.register(Tool {
        name: ToolName::new("web_search"),
        description: "Searches the web for a query string.".to_string(),
        annotations: ToolAnnotations::read_only(),
        input_schema: None,
        custom_budgets: BTreeMap::new(),
        handler: Arc::new(|_context, input| {
            let query = input.get("query").and_then(serde_json::Value::as_str).unwrap_or("");
            Ok(serde_json::json!({"results": [format!("result for '{query}'")]}))
        }),
    })?;

    registry.register(Tool {
        name: ToolName::new("write_report"),
        description: "Writes a final report summarizing findings.".to_string(),
        annotations: ToolAnnotations::side_effecting(),
        input_schema: None,
        custom_budgets: BTreeMap::new(),
        handler: Arc::new(|_context, input| {
            let summary = input.get("summary").and_then(serde_json::Value::as_str).unwrap_or("");
            Ok(serde_json::json!({"report_id": "report-1", "summary": summary}))
        }),
    })?;

    Ok(registry)
}

/// Builds the eligibility policy: `web_search` from `explore`, `write_report`
/// from `act` only, matching each tool's annotations.
fn build_policy() -> PolicyLayer {
    let mut eligibility = EligibilityPolicy::new();
    eligibility.allow(State::Explore, ToolName::new("web_search"));
    eligibility.allow(State::Act, ToolName::new("write_report"));

    let mut policy = PolicyLayer::new(eligibility);
    policy.per_call_budget = Some(BudgetName::new("tool_calls"));
    policy
}

/// The scripted decision sequence driving the run from `intake` to `done`.
fn build_script() -> Vec<Decision> {
    vec![
        Decision::Transition {
            target_state: State::Explore,
            reason: "begin researching the goal".to_string(),
        },
        Decision::CallTool {
            name: "web_search".to_string(),
            input: serde_json::json!({"query": "recent flaky deploy incidents"}),
            reason: "gather evidence before deciding".to_string(),
        },
        Decision::Transition {
            target_state: State::Decide,
            reason: "enough evidence gathered".to_string(),
        },
        Decision::Transition {
            target_state: State::Act,
            reason: "ready to record findings".to_string(),
        },
        Decision::CallTool {
            name: "write_report".to_string(),
            input: serde_json::json!({"summary": "deploys flake under load; root cause is a retry storm"}),
            reason: "persist the finding".to_string(),
        },
        Decision::Transition {
            target_state: State::Validate,
            reason: "confirm the report was written".to_string(),
        },
        Decision::Finish {
            summary: "investigation complete".to_string(),
            result: Some(serde_json::json!({"report_id": "report-1"})),
        },
    ]
}

/// Runs the engine-driven half of the demo and prints the resulting run.
fn run_engine_scenario(tools: ToolRegistry) -> Result<(), DemoError> {
    let planner = ScriptedPlanner::new(build_script());
    let policy = build_policy();
    let store = InMemoryRunStore::new();
    let config = EngineConfig::new(20).with_budget(BudgetName::new("tool_calls"), 5);

    let engine = Engine::new(planner, tools, store, policy, config)?;
    let run = engine.run("investigate flaky deploys", 0)?;

    let status = match run.status {
        runloop_core::RunStatus::Running => "running",
        runloop_core::RunStatus::Completed => "completed",
        runloop_core::RunStatus::Failed => "failed",
        runloop_core::RunStatus::Cancelled => "cancelled",
    };
    write_line("run", &format!("{} finished as {status} in {} steps", run.run_id, run.step_count))?;
    write_line("evidence entries recorded", &run.evidence.len().to_string())?;
    if let Some(result) = &run.result {
        write_line("result", &result.to_string())?;
    }
    Ok(())
}

/// Runs the same `write_report` call through a dispatcher worker instead of
/// the engine, demonstrating the decoupled execution path.
fn run_dispatch_scenario(tools: Arc<ToolRegistry>) -> Result<(), DemoError> {
    let queue = Arc::new(InMemoryQueue::new());
    let lock = Arc::new(InMemoryLock::new());
    let mut worker = Worker::new(Arc::clone(&queue) as Arc<dyn Queue>, lock, HolderId::new("demo-worker"), WorkerConfig::default());
    worker.register_tool_registry(tools);

    queue.enqueue(Task {
        task_id: TaskId::new("dispatch-1"),
        run_id: RunId::new("run-dispatch-1"),
        task_type: "tool_call".to_string(),
        input: serde_json::json!({"tool_name": "write_report", "input": {"summary": "dispatched report"}}),
        priority: 0,
        created_at_ms: 0,
        attempt: 0,
    })?;

    let processed = worker.poll_once()?;
    write_line("dispatcher processed a task", &processed.to_string())?;
    write_line("dispatcher success rate", &format!("{:.2}", worker.metrics().success_rate()))?;
    Ok(())
}

/// Runs both scenarios back to back against independently built registries.
fn main() -> Result<(), DemoError> {
    let tools = build_tools()?;
    let dispatch_tools = Arc::new(build_tools()?);

    run_engine_scenario(tools)?;
    run_dispatch_scenario(dispatch_tools)?;

    Ok(())
}
