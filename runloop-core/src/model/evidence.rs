// runloop-core/src/model/evidence.rs
// ============================================================================
// Module: Evidence Log
// Description: Append-only log of what the engine has observed during a run.
// Purpose: Give the planner a strictly ordered view of everything that happened.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Evidence is never mutated or reordered after it is appended; the vector's
//! insertion order is the run's step order.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// The kind of an evidence entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    /// The result (or error) of a tool invocation.
    ToolResult,
    /// Text supplied by a human in response to `AskHuman`.
    HumanInput,
    /// An engine-authored note, e.g. a transition reason or planner error.
    SystemNote,
}

/// One append-only entry in a run's evidence log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceEntry {
    /// What kind of observation this entry records.
    pub kind: EvidenceKind,
    /// Who or what produced this entry (tool name, "human", "engine", ...).
    pub source: String,
    /// The observed content.
    pub content: Value,
    /// Unix-epoch milliseconds when this entry was appended.
    pub timestamp_ms: u64,
}

impl EvidenceEntry {
    /// Builds a `tool_result` entry.
    #[must_use]
    pub fn tool_result(source: impl Into<String>, content: Value, timestamp_ms: u64) -> Self {
        Self {
            kind: EvidenceKind::ToolResult,
            source: source.into(),
            content,
            timestamp_ms,
        }
    }

    /// Builds a `human_input` entry; `source` is always `"human"`.
    #[must_use]
    pub fn human_input(content: Value, timestamp_ms: u64) -> Self {
        Self {
            kind: EvidenceKind::HumanInput,
            source: "human".to_string(),
            content,
            timestamp_ms,
        }
    }

    /// Builds a `system_note` entry, tagged with whatever part of the engine
    /// authored it (`"engine"`, `"planner"`, a tool name for a recorded
    /// handler error, ...).
    #[must_use]
    pub fn system_note(source: impl Into<String>, content: Value, timestamp_ms: u64) -> Self {
        Self {
            kind: EvidenceKind::SystemNote,
            source: source.into(),
            content,
            timestamp_ms,
        }
    }
}

/// Returns true iff `entries` is non-decreasing in `timestamp_ms`, the
/// ordering invariant checked against every run's evidence log.
#[must_use]
pub fn is_monotonic(entries: &[EvidenceEntry]) -> bool {
    entries.windows(2).all(|pair| pair[0].timestamp_ms <= pair[1].timestamp_ms)
}

#[cfg(test)]
mod tests {
    use super::EvidenceEntry;
    use super::is_monotonic;
    use serde_json::json;

    #[test]
    fn monotonic_accepts_non_decreasing_timestamps() {
        let entries = vec![
            EvidenceEntry::system_note("engine", json!("a"), 1),
            EvidenceEntry::system_note("engine", json!("b"), 1),
            EvidenceEntry::system_note("engine", json!("c"), 2),
        ];
        assert!(is_monotonic(&entries));
    }

    #[test]
    fn monotonic_rejects_out_of_order_timestamps() {
        let entries = vec![
            EvidenceEntry::system_note("engine", json!("a"), 2),
            EvidenceEntry::system_note("engine", json!("b"), 1),
        ];
        assert!(!is_monotonic(&entries));
    }
}
