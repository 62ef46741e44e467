// runloop-core/src/policy/eligibility.rs
// ============================================================================
// Module: Eligibility Policy
// Description: Maps a run state to the set of tool names allowed from it.
// Purpose: First rule set evaluated each policy check, before budgets.
// Dependencies: crate::model::{identifiers, state}, std::collections
// ============================================================================

//! ## Overview
//! Populated via explicit `allow(state, tool)` or `allow_all(state)` calls at
//! construction time; read-only thereafter, mirroring the run-mostly sharing
//! of the tool registry.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::model::identifiers::ToolName;
use crate::model::state::State;

/// Mapping from state to the set of tool names allowed from it.
#[derive(Debug, Clone, Default)]
pub struct EligibilityPolicy {
    allowed: BTreeMap<State, BTreeSet<ToolName>>,
    allow_all: BTreeSet<State>,
}

impl EligibilityPolicy {
    /// Creates an empty policy; no tool is allowed anywhere until configured.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allows a single tool from the given state.
    pub fn allow(&mut self, state: State, tool: ToolName) -> &mut Self {
        self.allowed.entry(state).or_default().insert(tool);
        self
    }

    /// Allows every registered tool from the given state.
    pub fn allow_all(&mut self, state: State) -> &mut Self {
        self.allow_all.insert(state);
        self
    }

    /// Returns true if `tool` is eligible from `state`, given the full set
    /// of registered tool names (needed to resolve `allow_all`).
    #[must_use]
    pub fn is_allowed(&self, state: State, tool: &ToolName, registered: &BTreeSet<ToolName>) -> bool {
        if self.allow_all.contains(&state) {
            return registered.contains(tool);
        }
        self.allowed.get(&state).is_some_and(|set| set.contains(tool))
    }

    /// Computes the full `allowed_tools` set for `state`.
    #[must_use]
    pub fn allowed_tools(&self, state: State, registered: &BTreeSet<ToolName>) -> BTreeSet<ToolName> {
        if self.allow_all.contains(&state) {
            return registered.clone();
        }
        self.allowed.get(&state).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::EligibilityPolicy;
    use crate::model::identifiers::ToolName;
    use crate::model::state::State;
    use std::collections::BTreeSet;

    #[test]
    fn allow_grants_only_the_named_tool() {
        let mut policy = EligibilityPolicy::new();
        policy.allow(State::Explore, ToolName::new("search"));
        let registered: BTreeSet<_> = [ToolName::new("search"), ToolName::new("delete_file")].into();

        assert!(policy.is_allowed(State::Explore, &ToolName::new("search"), &registered));
        assert!(!policy.is_allowed(State::Explore, &ToolName::new("delete_file"), &registered));
        assert!(!policy.is_allowed(State::Act, &ToolName::new("search"), &registered));
    }

    #[test]
    fn allow_all_grants_every_registered_tool() {
        let mut policy = EligibilityPolicy::new();
        policy.allow_all(State::Act);
        let registered: BTreeSet<_> = [ToolName::new("a"), ToolName::new("b")].into();

        assert_eq!(policy.allowed_tools(State::Act, &registered), registered);
    }
}
