// runloop-notify/src/error.rs
// ============================================================================
// Module: Notifier Error
// Description: The error taxonomy surfaced by webhook delivery.
// Purpose: Give callers a single typed error composed from the delivery
//          pipeline's failure modes.
// Dependencies: runloop_core::model::identifiers, thiserror
// ============================================================================

use runloop_core::model::identifiers::EndpointId;

/// Errors surfaced while delivering events to webhook endpoints.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifierError {
    /// `endpoint_id` returned a 4xx status; retrying would not help.
    #[error("endpoint '{endpoint_id}' rejected delivery with status {status}")]
    EndpointRejected {
        /// The endpoint that rejected delivery.
        endpoint_id: EndpointId,
        /// The HTTP status code returned.
        status: u16,
    },
    /// `endpoint_id` could not be reached after exhausting retries.
    #[error("endpoint '{endpoint_id}' is unavailable: {reason}")]
    EndpointUnavailable {
        /// The endpoint that could not be reached.
        endpoint_id: EndpointId,
        /// A human-readable description of the last failure.
        reason: String,
    },
    /// `endpoint_id`'s circuit breaker is open; the call was not attempted.
    #[error("endpoint '{endpoint_id}' circuit breaker is open")]
    CircuitOpen {
        /// The endpoint whose breaker is open.
        endpoint_id: EndpointId,
    },
    /// `endpoint_id`'s configured URL is not a valid, permitted destination.
    #[error("endpoint '{endpoint_id}' has an invalid url: {reason}")]
    InvalidUrl {
        /// The endpoint with the invalid URL.
        endpoint_id: EndpointId,
        /// Why the URL was rejected.
        reason: String,
    },
    /// The underlying HTTP client could not be constructed.
    #[error("failed to build http client: {0}")]
    ClientBuildFailed(String),
}
