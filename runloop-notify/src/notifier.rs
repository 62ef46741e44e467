// runloop-notify/src/notifier.rs
// ============================================================================
// Module: Notifier
// Description: Batches events and fans delivery out to every accepting
//              endpoint concurrently, serially per endpoint.
// Purpose: The public entry point of this crate; ties batching, signing,
//          circuit breaking and retry together.
// Dependencies: crate::{circuit, delivery, error, event}, std::{collections, sync}, tokio
// ============================================================================

//! ## Overview
//! [`Notifier::notify`] is a cheap, synchronous, fire-and-forget call: it
//! appends to an internal channel and returns immediately. A dedicated
//! background thread owns a single-threaded Tokio runtime that drains the
//! channel, batches by size and time, and fans each flushed batch out to
//! every endpoint concurrently (serially within one endpoint, since a
//! [`crate::delivery::DeliveryClient::deliver`] call retries in place before
//! returning).

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::circuit::CircuitBreaker;
use crate::circuit::CircuitConfig;
use crate::delivery::DeliveryClient;
use crate::error::NotifierError;
use crate::event::Endpoint;
use crate::event::Event;
use runloop_core::model::identifiers::EndpointId;

/// Batching tunables for one [`Notifier`].
#[derive(Debug, Clone, Copy)]
pub struct NotifierConfig {
    /// Flush once the pending buffer reaches this many events.
    pub max_batch_size: usize,
    /// Flush once this much time has elapsed since the first buffered event.
    pub max_wait: Duration,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 100,
            max_wait: Duration::from_secs(5),
        }
    }
}

/// Receives delivery failures a [`Notifier`] could not surface synchronously.
pub trait DeliveryErrorSink: Send + Sync {
    /// Records one failed delivery to `endpoint_id`.
    fn record(&self, endpoint_id: &EndpointId, error: &NotifierError);
}

/// Reference [`DeliveryErrorSink`] that buffers failures in memory.
#[derive(Default)]
pub struct InMemoryErrorSink {
    errors: Mutex<Vec<(EndpointId, String)>>,
}

impl InMemoryErrorSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all recorded failures, in recording order.
    #[must_use]
    pub fn errors(&self) -> Vec<(EndpointId, String)> {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        self.errors.lock().expect("error sink mutex poisoned").clone()
    }
}

impl DeliveryErrorSink for InMemoryErrorSink {
    fn record(&self, endpoint_id: &EndpointId, error: &NotifierError) {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        self.errors.lock().expect("error sink mutex poisoned").push((endpoint_id.clone(), error.to_string()));
    }
}

/// A command sent to the background batching worker.
enum Command {
    /// Append an event to the pending buffer.
    Notify(Event),
    /// Flush the pending buffer and stop the worker loop.
    Close,
}

/// Batches outbound events and delivers them to every subscribed endpoint.
pub struct Notifier {
    sender: mpsc::UnboundedSender<Command>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl Notifier {
    /// Starts a notifier with `config`, delivering to `endpoints` through
    /// `delivery`. `now_unix_secs` supplies the wall clock for signing and is
    /// injectable for deterministic tests.
    #[must_use]
    pub fn start(
        config: NotifierConfig,
        endpoints: Vec<Endpoint>,
        delivery: Arc<DeliveryClient>,
        error_sink: Arc<dyn DeliveryErrorSink>,
        now_unix_secs: Arc<dyn Fn() -> i64 + Send + Sync>,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let breakers: HashMap<EndpointId, Arc<CircuitBreaker>> = endpoints
            .iter()
            .map(|endpoint| (endpoint.id.clone(), Arc::new(CircuitBreaker::new(CircuitConfig::default()))))
            .collect();
        let endpoints = Arc::new(endpoints);
        let worker = std::thread::spawn(move || {
            #[allow(clippy::expect_used, reason = "a single-threaded runtime only fails to build under resource exhaustion")]
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .expect("failed to build notifier runtime");
            runtime.block_on(worker_loop(receiver, config, endpoints, breakers, delivery, error_sink, now_unix_secs));
        });
        Self {
            sender,
            worker: Some(worker),
        }
    }

    /// Appends `event` to the pending batch. Returns immediately; events
    /// submitted after [`Notifier::close`] has been called are dropped.
    pub fn notify(&self, event: Event) {
        let _ = self.sender.send(Command::Notify(event));
    }

    /// Flushes any pending events and stops the background worker,
    /// blocking until it exits.
    pub fn close(&mut self) {
        let _ = self.sender.send(Command::Close);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.close();
        }
    }
}

/// Drives the batching loop: accumulates events from `receiver` and flushes
/// on size or time thresholds, stopping once [`Command::Close`] is received
/// or every sender has been dropped.
async fn worker_loop(
    mut receiver: mpsc::UnboundedReceiver<Command>,
    config: NotifierConfig,
    endpoints: Arc<Vec<Endpoint>>,
    breakers: HashMap<EndpointId, Arc<CircuitBreaker>>,
    delivery: Arc<DeliveryClient>,
    error_sink: Arc<dyn DeliveryErrorSink>,
    now_unix_secs: Arc<dyn Fn() -> i64 + Send + Sync>,
) {
    let mut buffer: Vec<Event> = Vec::new();
    let mut first_buffered_at: Option<Instant> = None;

    loop {
        let next = if let Some(started) = first_buffered_at {
            let remaining = config.max_wait.saturating_sub(started.elapsed());
            match tokio::time::timeout(remaining, receiver.recv()).await {
                Ok(received) => received,
                Err(_elapsed) => {
                    flush(&mut buffer, &endpoints, &breakers, &delivery, &error_sink, now_unix_secs.as_ref()).await;
                    first_buffered_at = None;
                    continue;
                }
            }
        } else {
            receiver.recv().await
        };

        match next {
            Some(Command::Notify(event)) => {
                if buffer.is_empty() {
                    first_buffered_at = Some(Instant::now());
                }
                buffer.push(event);
                if buffer.len() >= config.max_batch_size {
                    flush(&mut buffer, &endpoints, &breakers, &delivery, &error_sink, now_unix_secs.as_ref()).await;
                    first_buffered_at = None;
                }
            }
            Some(Command::Close) | None => {
                flush(&mut buffer, &endpoints, &breakers, &delivery, &error_sink, now_unix_secs.as_ref()).await;
                return;
            }
        }
    }
}

/// Delivers every buffered event to each accepting, enabled endpoint, in
/// parallel across endpoints, then clears the buffer. A no-op if `buffer`
/// is empty.
async fn flush(
    buffer: &mut Vec<Event>,
    endpoints: &Arc<Vec<Endpoint>>,
    breakers: &HashMap<EndpointId, Arc<CircuitBreaker>>,
    delivery: &Arc<DeliveryClient>,
    error_sink: &Arc<dyn DeliveryErrorSink>,
    now_unix_secs: &(dyn Fn() -> i64 + Send + Sync),
) {
    if buffer.is_empty() {
        return;
    }
    let now = now_unix_secs();
    let mut handles = Vec::new();
    for endpoint in endpoints.iter() {
        let filtered: Vec<&Event> = buffer.iter().filter(|event| endpoint.accepts(event.event_type)).collect();
        if filtered.is_empty() {
            continue;
        }
        let Ok(body) = serde_json::to_vec(&filtered) else {
            continue;
        };
        let Some(breaker) = breakers.get(&endpoint.id).cloned() else {
            continue;
        };
        let endpoint = endpoint.clone();
        let delivery = Arc::clone(delivery);
        let error_sink = Arc::clone(error_sink);
        handles.push(tokio::task::spawn_blocking(move || {
            if let Err(error) = delivery.deliver(&endpoint, &body, now, &breaker) {
                error_sink.record(&endpoint.id, &error);
            }
        }));
    }
    for handle in handles {
        let _ = handle.await;
    }
    buffer.clear();
}

#[cfg(test)]
mod tests {
    use super::InMemoryErrorSink;
    use super::Notifier;
    use super::NotifierConfig;
    use crate::delivery::DeliveryClient;
    use crate::delivery::DeliveryConfig;
    use crate::event::Endpoint;
    use crate::event::Event;
    use crate::event::EventType;
    use crate::retry::RetryConfig;
    use runloop_core::model::identifiers::EndpointId;
    use runloop_core::model::identifiers::RunId;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn flush_on_close_delivers_buffered_events_to_a_closed_port() {
        let endpoint = Endpoint {
            id: EndpointId::new("e1"),
            url: "http://127.0.0.1:1/hook".to_string(),
            secret: None,
            event_filter: None,
            enabled: true,
            allow_http: true,
        };
        let delivery = Arc::new(DeliveryClient::new(DeliveryConfig {
            timeout: Duration::from_millis(50),
            retry: RetryConfig {
                max_retries: 0,
                initial_delay: Duration::from_millis(1),
                multiplier: 1.0,
            },
            ..DeliveryConfig::default()
        }).expect("client build"));
        let sink = Arc::new(InMemoryErrorSink::new());
        let mut notifier = Notifier::start(
            NotifierConfig::default(),
            vec![endpoint],
            delivery,
            sink.clone(),
            Arc::new(|| 0),
        );

        notifier.notify(Event::new(EventType::RunStarted, RunId::new("run-1"), 0, serde_json::json!({})));
        notifier.close();

        assert_eq!(sink.errors().len(), 1);
    }
}
