// runloop-core/src/engine/config.rs
// ============================================================================
// Module: Engine Configuration
// Description: Validated, in-process configuration for one `Engine` instance.
// Purpose: Catch misconfiguration (zero max_steps, missing budgets) at
//          construction rather than deep inside the step loop.
// Dependencies: crate::model::identifiers, std::{collections, time}
// ============================================================================

//! ## Overview
//! [`EngineConfig`] is built with a small constructor plus setters, then
//! validated once by [`EngineConfig::validate`], which `Engine::new` calls
//! on the caller's behalf. This is an in-process struct, not a file format:
//! loading one from TOML/YAML/env is an external embedder's concern.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::model::identifiers::BudgetName;

/// Validated configuration for one [`crate::engine::engine::Engine`] instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Hard ceiling on planner decisions processed per run.
    pub max_steps: u64,
    /// Initial budget limits applied to every new run.
    pub initial_budgets: BTreeMap<BudgetName, i64>,
    /// Default per-step deadline handed to the planner and to tool calls.
    pub step_deadline: Duration,
    /// Number of consecutive planner errors that terminates a run.
    pub max_consecutive_planner_errors: u32,
}

/// Raised when an [`EngineConfig`] fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineConfigError {
    /// `max_steps` was zero; no run could ever make progress.
    #[error("max_steps must be at least 1")]
    ZeroMaxSteps,
    /// `max_consecutive_planner_errors` was zero; a single planner error
    /// would always terminate the run, leaving no room for recovery.
    #[error("max_consecutive_planner_errors must be at least 1")]
    ZeroPlannerErrorTolerance,
    /// One of `initial_budgets` had a negative limit.
    #[error("budget '{0}' has a negative limit")]
    NegativeBudgetLimit(String),
}

impl EngineConfig {
    /// Builds a configuration with the given step ceiling and defaults for
    /// everything else: no initial budgets, a 30 second step deadline, and
    /// a tolerance of three consecutive planner errors.
    #[must_use]
    pub fn new(max_steps: u64) -> Self {
        Self {
            max_steps,
            initial_budgets: BTreeMap::new(),
            step_deadline: Duration::from_secs(30),
            max_consecutive_planner_errors: 3,
        }
    }

    /// Adds an initial budget limit, applied to every new run started
    /// through this configuration.
    pub fn with_budget(mut self, name: BudgetName, limit: i64) -> Self {
        self.initial_budgets.insert(name, limit);
        self
    }

    /// Overrides the default per-step deadline.
    #[must_use]
    pub const fn with_step_deadline(mut self, deadline: Duration) -> Self {
        self.step_deadline = deadline;
        self
    }

    /// Validates the configuration, returning the first violation found.
    ///
    /// # Errors
    /// Returns [`EngineConfigError`] if `max_steps` is zero,
    /// `max_consecutive_planner_errors` is zero, or any initial budget has a
    /// negative limit.
    pub fn validate(&self) -> Result<(), EngineConfigError> {
        if self.max_steps == 0 {
            return Err(EngineConfigError::ZeroMaxSteps);
        }
        if self.max_consecutive_planner_errors == 0 {
            return Err(EngineConfigError::ZeroPlannerErrorTolerance);
        }
        for (name, limit) in &self.initial_budgets {
            if *limit < 0 {
                return Err(EngineConfigError::NegativeBudgetLimit(name.as_str().to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::EngineConfig;
    use super::EngineConfigError;
    use crate::model::identifiers::BudgetName;

    #[test]
    fn zero_max_steps_fails_validation() {
        assert_eq!(EngineConfig::new(0).validate(), Err(EngineConfigError::ZeroMaxSteps));
    }

    #[test]
    fn negative_budget_limit_fails_validation() {
        let config = EngineConfig::new(10).with_budget(BudgetName::new("tool_calls"), -1);
        assert_eq!(
            config.validate(),
            Err(EngineConfigError::NegativeBudgetLimit("tool_calls".to_string()))
        );
    }

    #[test]
    fn sensible_defaults_validate_cleanly() {
        assert!(EngineConfig::new(20).validate().is_ok());
    }
}
