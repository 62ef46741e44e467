// runloop-core/src/engine/human.rs
// ============================================================================
// Module: Human Channel
// Description: The synchronous interactive channel `AskHuman` blocks on.
// Purpose: Let an embedder answer to a terminal, a chat UI, or a test
//          double, without the engine knowing which.
// Dependencies: crate::model::identifiers
// ============================================================================

//! ## Overview
//! `AskHuman` blocks the worker thread until [`HumanProvider::ask`] returns;
//! there is no async notification path. [`NoHumanProvider`] is the default
//! when an embedder configures no channel at all, and its `ask` call always
//! fails so the engine can surface [`crate::engine::error::EngineError::NoHumanChannel`].

use crate::model::identifiers::RunId;

/// Error returned when a question cannot be answered.
#[derive(Debug, Clone, thiserror::Error)]
#[error("human channel error: {0}")]
pub struct HumanChannelError(pub String);

/// Answers questions posed by `AskHuman` decisions.
pub trait HumanProvider: Send + Sync {
    /// Blocks until a human answers `question` for `run_id`, or returns an
    /// error if no answer is available.
    ///
    /// # Errors
    /// Returns [`HumanChannelError`] if no channel is configured or the
    /// channel fails to produce an answer.
    fn ask(
        &self,
        run_id: &RunId,
        question: &str,
        options: Option<&[String]>,
    ) -> Result<String, HumanChannelError>;
}

/// The default provider when no human channel is configured; always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHumanProvider;

impl HumanProvider for NoHumanProvider {
    fn ask(
        &self,
        _run_id: &RunId,
        _question: &str,
        _options: Option<&[String]>,
    ) -> Result<String, HumanChannelError> {
        Err(HumanChannelError("no human channel configured".to_string()))
    }
}

/// A provider that answers every question with a fixed, pre-scripted string;
/// useful for tests and unattended demos.
pub struct ScriptedHumanProvider {
    answer: String,
}

impl ScriptedHumanProvider {
    /// Builds a provider that always answers with `answer`.
    #[must_use]
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
        }
    }
}

impl HumanProvider for ScriptedHumanProvider {
    fn ask(
        &self,
        _run_id: &RunId,
        _question: &str,
        _options: Option<&[String]>,
    ) -> Result<String, HumanChannelError> {
        Ok(self.answer.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::HumanProvider;
    use super::NoHumanProvider;
    use super::ScriptedHumanProvider;
    use crate::model::identifiers::RunId;

    #[test]
    fn no_human_provider_always_fails() {
        let provider = NoHumanProvider;
        assert!(provider.ask(&RunId::new("run-1"), "continue?", None).is_err());
    }

    #[test]
    fn scripted_provider_always_returns_its_fixed_answer() {
        let provider = ScriptedHumanProvider::new("yes");
        let answer = provider.ask(&RunId::new("run-1"), "continue?", None);
        assert_eq!(answer.ok().as_deref(), Some("yes"));
    }
}
