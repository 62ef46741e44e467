// runloop-core/src/policy/budgets.rs
// ============================================================================
// Module: Budget Policy
// Description: Consumes named integer counters against per-run budgets.
// Purpose: Second rule set evaluated each policy check, after eligibility.
// Dependencies: crate::model::{identifiers, state}, std::collections
// ============================================================================

//! ## Overview
//! Budgets are named integer counters with limits fixed at engine
//! construction; consuming past the limit is [`BudgetError::Exhausted`]
//! rather than a silent clamp.

use std::collections::BTreeMap;

use crate::model::identifiers::BudgetName;
use crate::model::state::Budget;

/// Raised when a budget would be driven below zero.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("budget '{name}' exhausted (limit {limit}, consumed {consumed})")]
pub struct BudgetError {
    /// The budget that would have gone negative.
    pub name: BudgetName,
    /// The budget's configured limit.
    pub limit: i64,
    /// Units already consumed before this attempt.
    pub consumed: i64,
}

/// Consumes `amount` units from `name` within `budgets`.
///
/// An unconfigured budget name is treated as unlimited: this lets tools
/// declare custom budgets without requiring every engine to configure every
/// possible custom budget name up front.
///
/// # Errors
/// Returns [`BudgetError`] if consuming `amount` would drive the named
/// budget's remaining units below zero.
pub fn consume(
    budgets: &mut BTreeMap<BudgetName, Budget>,
    name: &BudgetName,
    amount: i64,
) -> Result<(), BudgetError> {
    let Some(budget) = budgets.get_mut(name) else {
        return Ok(());
    };
    let limit = budget.limit;
    let consumed = budget.consumed;
    if budget.try_consume(amount).is_none() {
        return Err(BudgetError {
            name: name.clone(),
            limit,
            consumed,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::consume;
    use crate::model::identifiers::BudgetName;
    use crate::model::state::Budget;
    use std::collections::BTreeMap;

    #[test]
    fn consume_fails_closed_at_the_limit() {
        let mut budgets = BTreeMap::new();
        budgets.insert(BudgetName::new("tool_calls"), Budget::new(2));

        assert!(consume(&mut budgets, &BudgetName::new("tool_calls"), 1).is_ok());
        assert!(consume(&mut budgets, &BudgetName::new("tool_calls"), 1).is_ok());
        assert!(consume(&mut budgets, &BudgetName::new("tool_calls"), 1).is_err());
    }

    #[test]
    fn unconfigured_budget_names_are_unlimited() {
        let mut budgets = BTreeMap::new();
        assert!(consume(&mut budgets, &BudgetName::new("custom"), 1000).is_ok());
    }
}
