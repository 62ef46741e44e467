// runloop-notify/src/lib.rs
// ============================================================================
// Module: Runloop Notify Library
// Description: Public API surface for batched, signed webhook delivery.
// Purpose: Expose event batching, HMAC signing, circuit breaking and retry
//          as one backend-agnostic crate.
// Dependencies: runloop_core, crate::{circuit, delivery, error, event, notifier, retry, signing}
// ============================================================================

//! ## Overview
//! `runloop-notify` turns run-engine lifecycle events into signed,
//! batched HTTP deliveries to external webhook subscribers, with a
//! per-endpoint circuit breaker and classified retry sitting between the
//! batching layer and the wire.

pub mod circuit;
pub mod delivery;
pub mod error;
pub mod event;
pub mod notifier;
pub mod retry;
pub mod signing;

pub use circuit::CircuitBreaker;
pub use circuit::CircuitConfig;
pub use delivery::DeliveryClient;
pub use delivery::DeliveryConfig;
pub use error::NotifierError;
pub use event::Endpoint;
pub use event::Event;
pub use event::EventType;
pub use notifier::DeliveryErrorSink;
pub use notifier::InMemoryErrorSink;
pub use notifier::Notifier;
pub use notifier::NotifierConfig;
pub use retry::classify_status;
pub use retry::retry;
pub use retry::Classification;
pub use retry::Outcome;
pub use retry::RetryConfig;
pub use signing::sign;
pub use signing::verify;
pub use signing::SignatureHeaders;
