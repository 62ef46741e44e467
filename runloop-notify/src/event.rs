// runloop-notify/src/event.rs
// ============================================================================
// Module: Notifier Event
// Description: The wire-format event a notifier batches and delivers.
// Purpose: Decouple what triggers a notification (run lifecycle, tool
//          execution, policy violations) from how it is delivered.
// Dependencies: runloop_core::model::{hashing, identifiers}, serde_json, time
// ============================================================================

//! ## Overview
//! [`Event`] mirrors the wire format external subscribers see: a stable id,
//! a [`EventType`] tag, the originating run, an RFC 3339 timestamp and a
//! type-specific payload. [`Endpoint`] is one webhook subscriber, with an
//! optional secret for signing and an optional type filter.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use runloop_core::model::hashing::hash_bytes;
use runloop_core::model::hashing::DEFAULT_HASH_ALGORITHM;
use runloop_core::model::identifiers::EndpointId;
use runloop_core::model::identifiers::EventId;
use runloop_core::model::identifiers::RunId;

/// The kind of lifecycle or execution event a run can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A run began executing.
    RunStarted,
    /// A run reached `done`.
    RunCompleted,
    /// A run reached `failed`.
    RunFailed,
    /// A run moved between states.
    StateChanged,
    /// A tool call completed, successfully or not.
    ToolExecuted,
    /// A policy check rejected a decision.
    PolicyViolated,
}

/// One notifier event, ready to be serialized into a delivery batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Stable identifier, derived from the event's own content.
    pub id: EventId,
    /// The event's kind.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// The run this event concerns.
    pub run_id: RunId,
    /// RFC 3339 timestamp of when the event was created.
    pub created_at: String,
    /// Type-specific payload.
    pub payload: Value,
}

impl Event {
    /// Builds an event, deriving its id from a hash of its own fields so
    /// that re-emitting identical content yields the same id.
    #[must_use]
    pub fn new(event_type: EventType, run_id: RunId, created_at_unix_ms: i128, payload: Value) -> Self {
        let created_at = OffsetDateTime::from_unix_timestamp_nanos(created_at_unix_ms.saturating_mul(1_000_000))
            .ok()
            .and_then(|timestamp| timestamp.format(&Rfc3339).ok())
            .unwrap_or_default();
        let digest_input = format!("{event_type:?}|{run_id}|{created_at}|{payload}");
        let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, digest_input.as_bytes());
        Self {
            id: EventId::new(digest.value),
            event_type,
            run_id,
            created_at,
            payload,
        }
    }
}

/// A webhook subscriber: a URL, an optional signing secret, and an optional
/// type filter restricting which events it receives.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Unique identifier for this endpoint.
    pub id: EndpointId,
    /// Destination URL; delivery enforces `https` unless `allow_http` is set.
    pub url: String,
    /// HMAC signing secret, if configured.
    pub secret: Option<String>,
    /// If present, only events whose type is in this set are delivered here.
    pub event_filter: Option<BTreeSet<EventType>>,
    /// Whether this endpoint currently accepts deliveries.
    pub enabled: bool,
    /// Allows a plain-`http` URL for this endpoint (disabled by default).
    pub allow_http: bool,
}

impl Endpoint {
    /// Returns true if this endpoint is enabled and its filter (if any)
    /// accepts `event_type`.
    #[must_use]
    pub fn accepts(&self, event_type: EventType) -> bool {
        self.enabled
            && self
                .event_filter
                .as_ref()
                .is_none_or(|filter| filter.contains(&event_type))
    }
}
