// runloop-notify/src/circuit.rs
// ============================================================================
// Module: Per-Endpoint Circuit Breaker
// Description: Trips after consecutive delivery failures, recovers after a
//              cooldown.
// Purpose: Stop hammering a subscriber that is consistently down, while
//          letting delivery resume automatically once it recovers.
// Dependencies: std::{sync, time}
// ============================================================================

//! ## Overview
//! A breaker starts closed. Each failed delivery increments a consecutive
//! counter; reaching `failure_threshold` opens the breaker for `open_timeout`.
//! Any call while open is refused outright. Once `open_timeout` elapses the
//! breaker allows exactly one trial call (half-open); success closes it,
//! failure reopens it for another full `open_timeout`.

use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

/// Tunables for one [`CircuitBreaker`].
#[derive(Debug, Clone, Copy)]
pub struct CircuitConfig {
    /// Consecutive failures required to open the breaker.
    pub failure_threshold: u32,
    /// How long the breaker stays open before allowing a trial call.
    pub open_timeout: Duration,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
        }
    }
}

/// Which phase the breaker is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Calls are allowed; failures accumulate toward the threshold.
    Closed,
    /// Calls are refused until `opened_at + open_timeout` passes.
    Open,
    /// One trial call is in flight; its outcome decides the next phase.
    HalfOpen,
}

/// Mutable breaker state, guarded by a single mutex.
struct State {
    /// Current phase.
    phase: Phase,
    /// Consecutive failures observed while closed.
    consecutive_failures: u32,
    /// When the breaker most recently opened.
    opened_at: Option<Instant>,
}

/// Per-endpoint failure tripwire gating outbound delivery attempts.
pub struct CircuitBreaker {
    config: CircuitConfig,
    state: Mutex<State>,
}

impl CircuitBreaker {
    /// Creates a closed breaker with `config`.
    #[must_use]
    pub fn new(config: CircuitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State {
                phase: Phase::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    /// Returns true if a call is currently allowed through. Transitions an
    /// expired `Open` breaker to `HalfOpen` as a side effect.
    #[must_use]
    pub fn allow_call(&self) -> bool {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        let mut guard = self.state.lock().expect("circuit breaker mutex poisoned");
        match guard.phase {
            Phase::Closed => true,
            Phase::HalfOpen => false,
            Phase::Open => {
                let elapsed = guard.opened_at.is_some_and(|opened_at| opened_at.elapsed() >= self.config.open_timeout);
                if elapsed {
                    guard.phase = Phase::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Records a successful call, closing the breaker and resetting its
    /// failure count.
    pub fn record_success(&self) {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        let mut guard = self.state.lock().expect("circuit breaker mutex poisoned");
        guard.phase = Phase::Closed;
        guard.consecutive_failures = 0;
        guard.opened_at = None;
    }

    /// Records a failed call, opening the breaker once the consecutive
    /// failure threshold is reached (including a failed half-open trial).
    pub fn record_failure(&self) {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        let mut guard = self.state.lock().expect("circuit breaker mutex poisoned");
        if guard.phase == Phase::HalfOpen {
            guard.phase = Phase::Open;
            guard.opened_at = Some(Instant::now());
            return;
        }
        guard.consecutive_failures += 1;
        if guard.consecutive_failures >= self.config.failure_threshold {
            guard.phase = Phase::Open;
            guard.opened_at = Some(Instant::now());
        }
    }

    /// Returns true if the breaker is currently open (refusing calls,
    /// ignoring the half-open probe window).
    #[must_use]
    pub fn is_open(&self) -> bool {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        let guard = self.state.lock().expect("circuit breaker mutex poisoned");
        guard.phase == Phase::Open
    }
}
