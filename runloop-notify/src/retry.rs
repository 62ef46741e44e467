// runloop-notify/src/retry.rs
// ============================================================================
// Module: Delivery Retrier
// Description: Exponential backoff retry with explicit retryable/non-retryable
//              classification.
// Purpose: Give the webhook delivery path a bounded, classified retry loop
//          independent of the circuit breaker that gates it.
// Dependencies: std::time
// ============================================================================

//! ## Overview
//! [`classify_status`] turns an HTTP status code into an [`Outcome`];
//! [`retry`] runs a fallible operation up to `max_retries` additional times,
//! sleeping with exponential backoff between attempts, stopping immediately
//! on a non-retryable outcome.

use std::time::Duration;

/// Backoff policy for [`retry`].
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Additional attempts after the first, on a retryable failure.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each retry.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

/// How one attempt's result should be treated.
#[derive(Debug, Clone)]
pub enum Outcome<T, E> {
    /// The attempt succeeded.
    Success(T),
    /// The attempt failed but another attempt may succeed.
    Retryable(E),
    /// The attempt failed in a way no retry can fix.
    NonRetryable(E),
}

/// Classifies an HTTP status code per the delivery resilience contract:
/// 2xx succeeds, 5xx and anything else unexpected retries, 4xx does not.
#[must_use]
pub fn classify_status(status: u16) -> Classification {
    match status {
        200..=299 => Classification::Success,
        400..=499 => Classification::NonRetryable,
        _ => Classification::Retryable,
    }
}

/// The coarse bucket a status code falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// 2xx.
    Success,
    /// 5xx, or a transport-level failure.
    Retryable,
    /// 4xx.
    NonRetryable,
}

/// Runs `attempt` up to `config.max_retries + 1` times, sleeping with
/// exponential backoff between retryable failures. Returns the last error
/// seen if every attempt is exhausted or a non-retryable failure occurs.
pub fn retry<T, E>(config: RetryConfig, mut attempt: impl FnMut(u32) -> Outcome<T, E>) -> Result<T, E> {
    let mut delay = config.initial_delay;
    for try_index in 0..=config.max_retries {
        match attempt(try_index) {
            Outcome::Success(value) => return Ok(value),
            Outcome::NonRetryable(error) => return Err(error),
            Outcome::Retryable(error) => {
                if try_index == config.max_retries {
                    return Err(error);
                }
                std::thread::sleep(delay);
                #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, reason = "backoff duration math, millisecond precision is sufficient")]
                {
                    delay = Duration::from_millis((delay.as_millis() as f64 * config.multiplier) as u64);
                }
            }
        }
    }
    unreachable!("loop always returns via Ok/Err above")
}
