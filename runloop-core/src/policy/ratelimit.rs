// runloop-core/src/policy/ratelimit.rs
// ============================================================================
// Module: Rate Limit Policy
// Description: Token-bucket rate limiting per tool or globally.
// Purpose: Fourth rule set evaluated each policy check, after approval.
// Dependencies: crate::model::identifiers, std::{collections, sync, time}
// ============================================================================

//! ## Overview
//! Each bucket refills at `rate_per_sec` tokens/second up to `burst` tokens.
//! `try_acquire` is a pure function of elapsed time so it can be driven by a
//! test clock; [`RateLimiter::acquire`] layers blocking-with-deadline
//! semantics on top for production use.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use crate::model::identifiers::ToolName;

/// Configuration for one token bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketConfig {
    /// Tokens replenished per second.
    pub rate_per_sec: f64,
    /// Maximum tokens the bucket can hold.
    pub burst: f64,
}

impl BucketConfig {
    /// Builds a bucket configuration.
    #[must_use]
    pub const fn new(rate_per_sec: f64, burst: f64) -> Self {
        Self {
            rate_per_sec,
            burst,
        }
    }
}

/// A single token bucket's mutable state.
#[derive(Debug, Clone, Copy)]
struct BucketState {
    tokens: f64,
    last_refill_ms: u64,
}

/// Pure token-bucket admission check: refills `state` to `now_ms`, then
/// attempts to withdraw one token.
fn try_withdraw(config: BucketConfig, state: &mut BucketState, now_ms: u64) -> bool {
    let elapsed_ms = now_ms.saturating_sub(state.last_refill_ms);
    let refill = (elapsed_ms as f64 / 1000.0) * config.rate_per_sec;
    state.tokens = (state.tokens + refill).min(config.burst);
    state.last_refill_ms = now_ms;

    if state.tokens >= 1.0 {
        state.tokens -= 1.0;
        true
    } else {
        false
    }
}

/// Per-tool (or global) token-bucket rate limiter.
pub struct RateLimiter {
    global: Option<BucketConfig>,
    per_tool: HashMap<ToolName, BucketConfig>,
    state: Mutex<HashMap<Option<ToolName>, BucketState>>,
}

impl RateLimiter {
    /// Creates a limiter with no configured buckets (unlimited by default).
    #[must_use]
    pub fn new() -> Self {
        Self {
            global: None,
            per_tool: HashMap::new(),
            state: Mutex::new(HashMap::new()),
        }
    }

    /// Sets the global bucket applied when no per-tool bucket matches.
    pub fn set_global(&mut self, config: BucketConfig) -> &mut Self {
        self.global = Some(config);
        self
    }

    /// Sets a bucket scoped to a single tool.
    pub fn set_per_tool(&mut self, tool: ToolName, config: BucketConfig) -> &mut Self {
        self.per_tool.insert(tool, config);
        self
    }

    /// Returns the bucket config for `tool`, falling back to the global
    /// bucket if no per-tool override is configured.
    fn config_for(&self, tool: &ToolName) -> Option<BucketConfig> {
        self.per_tool.get(tool).copied().or(self.global)
    }

    /// Attempts a non-blocking withdrawal for `tool` at `now_ms`. Returns
    /// true if no bucket is configured for `tool` (unlimited).
    #[must_use]
    pub fn try_acquire(&self, tool: &ToolName, now_ms: u64) -> bool {
        let Some(config) = self.config_for(tool) else {
            return true;
        };
        let key = if self.per_tool.contains_key(tool) {
            Some(tool.clone())
        } else {
            None
        };
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        let mut guard = self.state.lock().expect("rate limiter mutex poisoned");
        let entry = guard.entry(key).or_insert(BucketState {
            tokens: config.burst,
            last_refill_ms: now_ms,
        });
        try_withdraw(config, entry, now_ms)
    }

    /// Blocks (sleeping in small increments) until a token is available or
    /// `deadline_ms` (measured against the wall clock) passes.
    #[must_use]
    pub fn acquire(&self, tool: &ToolName, deadline_ms: u64) -> bool {
        let start = Instant::now();
        let deadline_from_start = Duration::from_millis(deadline_ms);
        loop {
            let now_ms = wall_clock_ms();
            if self.try_acquire(tool, now_ms) {
                return true;
            }
            if start.elapsed() >= deadline_from_start {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Current wall-clock time as Unix-epoch milliseconds.
fn wall_clock_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::BucketConfig;
    use super::RateLimiter;
    use crate::model::identifiers::ToolName;

    #[test]
    fn unconfigured_tool_is_unlimited() {
        let limiter = RateLimiter::new();
        assert!(limiter.try_acquire(&ToolName::new("anything"), 0));
        assert!(limiter.try_acquire(&ToolName::new("anything"), 0));
    }

    #[test]
    fn bucket_refuses_once_exhausted_then_refills_over_time() {
        let mut limiter = RateLimiter::new();
        limiter.set_global(BucketConfig::new(1.0, 1.0));
        let tool = ToolName::new("search");

        assert!(limiter.try_acquire(&tool, 0));
        assert!(!limiter.try_acquire(&tool, 0));
        assert!(limiter.try_acquire(&tool, 1_000));
    }

    #[test]
    fn per_tool_bucket_is_independent_of_global() {
        let mut limiter = RateLimiter::new();
        limiter.set_global(BucketConfig::new(0.0, 0.0));
        limiter.set_per_tool(ToolName::new("fast"), BucketConfig::new(100.0, 10.0));

        assert!(limiter.try_acquire(&ToolName::new("fast"), 0));
        assert!(!limiter.try_acquire(&ToolName::new("slow"), 0));
    }
}
