// runloop-core/src/lib.rs
// ============================================================================
// Module: Runloop Core Library
// Description: Public API surface for the runloop run engine.
// Purpose: Expose the data model, policy layer, middleware chain and run
//          engine as one backend-agnostic crate.
// Dependencies: crate::{engine, middleware, model, policy}
// ============================================================================

//! ## Overview
//! `runloop-core` implements a deterministic state-machine agent-run engine:
//! a fixed `intake -> explore -> decide -> act -> validate -> done/failed`
//! alphabet, a pluggable planner contract, a tool contract with declarative
//! annotations, an append-only evidence log, a four-stage policy layer
//! (eligibility, budgets, approval, rate limit) and a five-stage built-in
//! middleware chain (tracing, metrics, validation, audit, logging). It does
//! not decide anything itself; every decision comes from an embedder-supplied
//! [`engine::Planner`].

pub mod engine;
pub mod middleware;
pub mod model;
pub mod policy;

pub use engine::Engine;
pub use engine::EngineBuildError;
pub use engine::EngineConfig;
pub use engine::EngineConfigError;
pub use engine::EngineError;
pub use engine::Planner;
pub use engine::PlannerError;
pub use engine::PlannerRequest;
pub use engine::RunStore;
pub use engine::Telemetry;
pub use model::Decision;
pub use model::DecisionOutcome;
pub use model::Run;
pub use model::RunStatus;
pub use model::State;
pub use model::Tool;
pub use model::ToolAnnotations;
pub use model::ToolRegistry;
pub use policy::CallRequest;
pub use policy::CheckError;
pub use policy::PolicyLayer;
