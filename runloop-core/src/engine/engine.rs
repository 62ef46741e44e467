// runloop-core/src/engine/engine.rs
// ============================================================================
// Module: Run Engine
// Description: The deterministic outer loop advancing a run from `intake`
//              to a terminal state.
// Purpose: The single canonical execution path every embedder drives a run
//          through; all decision-making is delegated to the planner, all
//          admission control to the policy layer.
// Dependencies: crate::{engine, middleware, model, policy}
// ============================================================================

//! ## Overview
//! [`Engine::new`] validates its tool registry and configuration up front
//! and returns `Result<Engine<..>, EngineBuildError>` rather than panicking.
//! [`Engine::run`] drives a fresh run to completion; [`Engine::step`]
//! advances an existing run by exactly one planner decision and is the
//! primary introspection surface for tests and demos.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::engine::config::EngineConfig;
use crate::engine::error::EngineError;
use crate::engine::human::HumanProvider;
use crate::engine::human::NoHumanProvider;
use crate::engine::planner::Planner;
use crate::engine::planner::PlannerRequest;
use crate::engine::store::RunStore;
use crate::middleware::audit::AuditSink;
use crate::middleware::audit::AuditMiddleware;
use crate::middleware::audit::InMemoryAuditSink;
use crate::middleware::logging::LogSink;
use crate::middleware::logging::LoggingMiddleware;
use crate::middleware::logging::StdoutLogSink;
use crate::middleware::metrics::InMemoryMeter;
use crate::middleware::metrics::Meter;
use crate::middleware::metrics::MetricsMiddleware;
use crate::middleware::tracing::InMemoryTracer;
use crate::middleware::tracing::Tracer;
use crate::middleware::tracing::TracingMiddleware;
use crate::middleware::validation::ValidationMiddleware;
use crate::middleware::Middleware;
use crate::middleware::MiddlewareChain;
use crate::model::decision::Decision;
use crate::model::decision::DecisionOutcome;
use crate::model::evidence::EvidenceEntry;
use crate::model::identifiers::RunId;
use crate::model::state::Run;
use crate::model::state::RunStatus;
use crate::model::state::State;
use crate::model::tool::ToolContext;
use crate::model::tool::ToolRegistry;
use crate::model::tool::ToolRegistryError;
use crate::policy::CallRequest;
use crate::policy::CheckError;
use crate::policy::PolicyLayer;

/// Raised while constructing an [`Engine`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineBuildError {
    /// The tool registry failed to validate.
    #[error(transparent)]
    Registry(#[from] ToolRegistryError),
    /// The engine configuration failed to validate.
    #[error(transparent)]
    Config(#[from] crate::engine::config::EngineConfigError),
}

/// Optional cross-cutting sinks an embedder may wire into an [`Engine`],
/// with sensible in-memory defaults for tests and demos.
pub struct Telemetry {
    /// Span sink consulted by the tracing middleware.
    pub tracer: Arc<dyn Tracer>,
    /// Metric sink consulted by the metrics middleware.
    pub meter: Arc<dyn Meter>,
    /// Durable audit sink consulted by the audit middleware.
    pub audit_sink: Arc<dyn AuditSink>,
    /// Log sink consulted by the logging middleware.
    pub log_sink: Arc<dyn LogSink>,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self {
            tracer: Arc::new(InMemoryTracer::new()),
            meter: Arc::new(InMemoryMeter::new()),
            audit_sink: Arc::new(InMemoryAuditSink::new()),
            log_sink: Arc::new(StdoutLogSink),
        }
    }
}

/// Deterministic run engine tying the planner, tool registry, policy layer,
/// middleware chain and run store together.
pub struct Engine<P, S> {
    planner: P,
    tools: ToolRegistry,
    store: S,
    policy: PolicyLayer,
    human_provider: Arc<dyn HumanProvider>,
    config: EngineConfig,
    telemetry: Telemetry,
    extra_middlewares: Vec<Arc<dyn Middleware>>,
}

impl<P, S> Engine<P, S>
where
    P: Planner,
    S: RunStore,
{
    /// Builds an engine, validating `tools` and `config` up front.
    ///
    /// # Errors
    /// Returns [`EngineBuildError`] if `tools` contains a duplicate or empty
    /// name, or `config` fails its own validation (e.g. zero `max_steps`).
    pub fn new(
        planner: P,
        tools: ToolRegistry,
        store: S,
        policy: PolicyLayer,
        config: EngineConfig,
    ) -> Result<Self, EngineBuildError> {
        config.validate()?;
        Ok(Self {
            planner,
            tools,
            store,
            policy,
            human_provider: Arc::new(NoHumanProvider),
            config,
            telemetry: Telemetry::default(),
            extra_middlewares: Vec::new(),
        })
    }

    /// Replaces the configured human-input provider.
    pub fn set_human_provider(&mut self, provider: Arc<dyn HumanProvider>) -> &mut Self {
        self.human_provider = provider;
        self
    }

    /// Replaces the configured telemetry sinks.
    pub fn set_telemetry(&mut self, telemetry: Telemetry) -> &mut Self {
        self.telemetry = telemetry;
        self
    }

    /// Appends an embedder-supplied middleware, innermost of the five
    /// built-ins (it runs closest to the handler).
    pub fn add_middleware(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        self.extra_middlewares.push(middleware);
        self
    }

    /// Builds a fresh middleware chain for one call to `tool_name`, in the
    /// fixed order tracing, metrics, validation, audit, logging, then any
    /// embedder-supplied extras.
    fn chain_for(&self, tool_name: &crate::model::identifiers::ToolName) -> MiddlewareChain {
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(TracingMiddleware::new(self.telemetry.tracer.clone())));
        chain.push(Arc::new(MetricsMiddleware::new(self.telemetry.meter.clone(), tool_name.clone())));
        chain.push(Arc::new(ValidationMiddleware::new()));
        chain.push(Arc::new(AuditMiddleware::new(self.telemetry.audit_sink.clone(), tool_name.clone())));
        chain.push(Arc::new(LoggingMiddleware::new(self.telemetry.log_sink.clone(), tool_name.clone())));
        for middleware in &self.extra_middlewares {
            chain.push(middleware.clone());
        }
        chain
    }

    /// Resolves the set of tool names the eligibility policy admits from `state`.
    fn eligible_tools(&self, state: State) -> BTreeSet<crate::model::identifiers::ToolName> {
        let registered: BTreeSet<_> = self.tools.iter().map(|tool| tool.name.clone()).collect();
        self.policy.eligibility.allowed_tools(state, &registered)
    }

    /// Starts a fresh run for `goal` and drives it to a terminal state.
    ///
    /// # Errors
    /// Returns [`EngineError`] if the run store fails, or propagates a
    /// terminating error from the step loop (the terminal `Run` is
    /// persisted before the error is returned).
    pub fn run(&self, goal: impl Into<String>, now_ms: u64) -> Result<Run, EngineError> {
        let run_id = RunId::new(format!("run-{now_ms:x}"));
        let mut run = Run::new(run_id, goal, now_ms, self.config.initial_budgets.clone().into_iter().map(|(name, limit)| (name, crate::model::state::Budget::new(limit))).collect());
        run.evidence.push(EvidenceEntry::system_note("engine", serde_json::json!({"event": "run_started"}), now_ms));

        let mut consecutive_planner_errors: u32 = 0;
        loop {
            if run.current_state.is_terminal() {
                break;
            }
            if run.step_count >= self.config.max_steps {
                run.status = RunStatus::Failed;
                run.current_state = State::Failed;
                run.error = Some("max step count exceeded".to_string());
                run.evidence.push(EvidenceEntry::system_note(
                    "engine",
                    serde_json::json!({"event": "failed", "reason": "max step count exceeded"}),
                    now_ms,
                ));
                self.store.put(run.clone()).map_err(|error| EngineError::Store(error.to_string()))?;
                return Err(EngineError::MaxStepsExceeded {
                    run_id: run.run_id.clone(),
                    max_steps: self.config.max_steps,
                });
            }

            match self.advance(&mut run, now_ms) {
                Ok(_outcome) => {
                    consecutive_planner_errors = 0;
                }
                Err(EngineError::Planner(message)) => {
                    consecutive_planner_errors += 1;
                    if consecutive_planner_errors >= self.config.max_consecutive_planner_errors {
                        run.status = RunStatus::Failed;
                        run.current_state = State::Failed;
                        run.error = Some(format!("planner failed {consecutive_planner_errors} times in a row: {message}"));
                        self.store.put(run.clone()).map_err(|store_error| EngineError::Store(store_error.to_string()))?;
                        return Err(EngineError::PlannerExhausted(run.run_id.clone()));
                    }
                }
                Err(error) => {
                    run.status = RunStatus::Failed;
                    run.current_state = State::Failed;
                    run.error = Some(error.to_string());
                    run.evidence.push(EvidenceEntry::system_note(
                        "engine",
                        serde_json::json!({"event": "failed", "reason": error.to_string()}),
                        now_ms,
                    ));
                    self.store.put(run.clone()).map_err(|store_error| EngineError::Store(store_error.to_string()))?;
                    return Err(error);
                }
            }
            run.step_count += 1;
        }

        self.store.put(run.clone()).map_err(|error| EngineError::Store(error.to_string()))?;
        Ok(run)
    }

    /// Advances `run` by exactly one planner decision.
    ///
    /// # Errors
    /// Returns [`EngineError`] for any terminating condition (policy
    /// violation, budget exhaustion, unknown tool/transition, no human
    /// channel); planner and tool errors are instead recorded as evidence
    /// and `Ok` is returned so the loop can continue.
    pub fn step(&self, run: &mut Run, now_ms: u64) -> Result<DecisionOutcome, EngineError> {
        self.advance(run, now_ms)
    }

    /// Consults the planner for `run`'s current state and dispatches the
    /// resulting decision.
    fn advance(&self, run: &mut Run, now_ms: u64) -> Result<DecisionOutcome, EngineError> {
        let eligible = self.eligible_tools(run.current_state);
        let request = PlannerRequest {
            run_id: &run.run_id,
            goal: &run.goal,
            state: run.current_state,
            evidence: &run.evidence,
            eligible_tools: &eligible,
            step_count: run.step_count,
            deadline: self.config.step_deadline,
        };

        let decision = match self.planner.plan(&request) {
            Ok(decision) => {
                run.error = None;
                decision
            }
            Err(error) => {
                run.evidence.push(EvidenceEntry::system_note(
                    "planner",
                    serde_json::json!({"error": error.message}),
                    now_ms,
                ));
                return Err(EngineError::Planner(error.message));
            }
        };

        self.dispatch(run, decision, now_ms)
    }

    /// Routes `decision` to its per-variant handler.
    fn dispatch(&self, run: &mut Run, decision: Decision, now_ms: u64) -> Result<DecisionOutcome, EngineError> {
        match decision {
            Decision::CallTool { name, input, reason } => self.dispatch_call_tool(run, &name, &input, &reason, now_ms),
            Decision::Transition { target_state, reason } => self.dispatch_transition(run, target_state, &reason, now_ms),
            Decision::AskHuman { question, options } => self.dispatch_ask_human(run, &question, options, now_ms),
            Decision::Finish { summary, result } => self.dispatch_finish(run, &summary, result, now_ms),
            Decision::Fail { reason, error } => self.dispatch_fail(run, &reason, error, now_ms),
        }
    }

    /// Runs policy checks then the middleware-wrapped handler for a
    /// `CallTool` decision, recording the outcome as evidence either way.
    fn dispatch_call_tool(
        &self,
        run: &mut Run,
        name: &str,
        input: &Value,
        reason: &str,
        now_ms: u64,
    ) -> Result<DecisionOutcome, EngineError> {
        let tool_name = crate::model::identifiers::ToolName::new(name);
        let Some(tool) = self.tools.get(&tool_name) else {
            run.evidence.push(EvidenceEntry::system_note(
                name,
                serde_json::json!({"event": "failed", "reason": "unknown tool"}),
                now_ms,
            ));
            return Err(EngineError::UnknownTool(name.to_string()));
        };
        let registered: BTreeSet<_> = self.tools.iter().map(|t| t.name.clone()).collect();

        let deadline_ms = now_ms + duration_ms(self.config.step_deadline);
        let request = CallRequest {
            run_id: &run.run_id,
            state: run.current_state,
            tool: &tool_name,
            annotations: &tool.annotations,
            input,
            custom_budgets: &tool.custom_budgets,
            deadline_ms,
        };

        if let Err(error) = self.policy.check(&request, &mut run.budgets, &registered) {
            let engine_error = match error {
                CheckError::Policy(policy_error) => EngineError::Policy(policy_error),
                CheckError::Budget(budget_error) => EngineError::Budget(budget_error),
            };
            run.evidence.push(EvidenceEntry::system_note(
                name,
                serde_json::json!({"event": "failed", "reason": engine_error.to_string()}),
                now_ms,
            ));
            return Err(engine_error);
        }

        let context = ToolContext {
            run_id: run.run_id.clone(),
            state: run.current_state,
            reason: reason.to_string(),
            deadline_ms,
        };
        let chain = self.chain_for(&tool_name);
        let handler = tool.handler.clone();
        let outcome = chain.run(&context, input, &move |ctx, value| handler(ctx, value));

        let evidence_index = run.evidence.len();
        match outcome {
            Ok(result) => {
                run.evidence.push(EvidenceEntry::tool_result(
                    name,
                    serde_json::json!({"input": input, "output": result}),
                    now_ms,
                ));
                Ok(DecisionOutcome::ToolCalled {
                    tool: name.to_string(),
                    evidence_index,
                })
            }
            Err(error) => {
                run.evidence.push(EvidenceEntry::system_note(
                    name,
                    serde_json::json!({"error": error.message}),
                    now_ms,
                ));
                if tool.annotations.fail_on_error {
                    Err(EngineError::Tool(error))
                } else {
                    Ok(DecisionOutcome::ToolCalled {
                        tool: name.to_string(),
                        evidence_index,
                    })
                }
            }
        }
    }

    /// Moves `run` to `target_state`, rejecting a transition back to `intake`.
    fn dispatch_transition(
        &self,
        run: &mut Run,
        target_state: State,
        reason: &str,
        now_ms: u64,
    ) -> Result<DecisionOutcome, EngineError> {
        if matches!(target_state, State::Intake) {
            run.evidence.push(EvidenceEntry::system_note(
                "transition",
                serde_json::json!({
                    "event": "failed",
                    "from": run.current_state.as_str(),
                    "to": target_state.as_str(),
                    "reason": "invalid transition",
                }),
                now_ms,
            ));
            return Err(EngineError::InvalidTransition {
                from: run.current_state.as_str().to_string(),
                to: target_state.as_str().to_string(),
            });
        }
        let from = run.current_state;
        run.current_state = target_state;
        run.evidence.push(EvidenceEntry::system_note(
            "transition",
            serde_json::json!({"from": from.as_str(), "to": target_state.as_str(), "reason": reason}),
            now_ms,
        ));
        Ok(DecisionOutcome::Transitioned {
            from,
            to: target_state,
        })
    }

    /// Blocks on the configured human provider and records the answer.
    fn dispatch_ask_human(
        &self,
        run: &mut Run,
        question: &str,
        options: Option<Vec<String>>,
        now_ms: u64,
    ) -> Result<DecisionOutcome, EngineError> {
        let answer = match self.human_provider.ask(&run.run_id, question, options.as_deref()) {
            Ok(answer) => answer,
            Err(_) => {
                run.evidence.push(EvidenceEntry::system_note(
                    "human",
                    serde_json::json!({"event": "failed", "reason": "no human channel configured"}),
                    now_ms,
                ));
                return Err(EngineError::NoHumanChannel(run.run_id.clone()));
            }
        };
        let evidence_index = run.evidence.len();
        run.evidence.push(EvidenceEntry::human_input(
            serde_json::json!({"question": question, "answer": answer}),
            now_ms,
        ));
        Ok(DecisionOutcome::HumanAnswered {
            evidence_index,
        })
    }

    /// Marks `run` completed with `result` as its final payload.
    fn dispatch_finish(&self, run: &mut Run, summary: &str, result: Option<Value>, now_ms: u64) -> Result<DecisionOutcome, EngineError> {
        run.status = RunStatus::Completed;
        run.current_state = State::Done;
        run.result = result.clone();
        run.evidence.push(EvidenceEntry::system_note(
            "engine",
            serde_json::json!({"event": "finished", "summary": summary}),
            now_ms,
        ));
        Ok(DecisionOutcome::Finished {
            result,
        })
    }

    /// Marks `run` failed with `reason` as its final disposition.
    fn dispatch_fail(&self, run: &mut Run, reason: &str, error: Option<Value>, now_ms: u64) -> Result<DecisionOutcome, EngineError> {
        run.status = RunStatus::Failed;
        run.current_state = State::Failed;
        run.error = Some(reason.to_string());
        run.evidence.push(EvidenceEntry::system_note(
            "engine",
            serde_json::json!({"event": "failed", "reason": reason, "error": error}),
            now_ms,
        ));
        Ok(DecisionOutcome::Failed {
            reason: reason.to_string(),
        })
    }
}

/// Converts `duration` to milliseconds, saturating at `u64::MAX`.
fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
