//! Per-key circuit breakers for failing remote hosts.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: host assumed down, calls fail fast until the reset interval elapses
//! - HalfOpen: exactly one probe call in flight, others fail fast
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures reach threshold
//! Open → HalfOpen: first admission after the reset interval elapses
//! HalfOpen → Closed: probe succeeds
//! HalfOpen → Open: probe fails
//! ```
//!
//! # Design Decisions
//! - Per-key breakers; keys may be shared across hosts by the caller
//! - Single probe in HalfOpen, so a recovering host is never hammered by
//!   a burst of simultaneous retries the instant the timer elapses
//! - A success from any state fully closes the breaker
//! - Entries persist until explicitly cleared; failure history must
//!   outlive any single call

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::RequestError;
use crate::observability::metrics;

/// Breaker tuning for one key.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerPolicy {
    /// Consecutive failures before the breaker opens. 0 disables the
    /// breaker entirely.
    pub threshold: u32,

    /// How long the breaker stays open before admitting a probe, in
    /// milliseconds.
    pub reset_ms: u64,
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self {
            threshold: 5,
            reset_ms: 30_000,
        }
    }
}

impl BreakerPolicy {
    /// A policy that never trips.
    pub fn disabled() -> Self {
        Self {
            threshold: 0,
            reset_ms: 0,
        }
    }

    pub fn reset_interval(&self) -> Duration {
        Duration::from_millis(self.reset_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed,
    Open { until: Instant },
    HalfOpen,
}

#[derive(Debug)]
struct BreakerEntry {
    state: BreakerState,
    failures: u32,
}

impl BreakerEntry {
    fn new() -> Self {
        Self {
            state: BreakerState::Closed,
            failures: 0,
        }
    }
}

/// Registry of circuit breaker entries, keyed by caller-chosen strings.
#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    entries: Mutex<HashMap<String, BreakerEntry>>,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether a call under `key` may proceed. Rejections carry the
    /// earliest instant a retry could be admitted.
    pub fn admit(&self, key: &str, policy: &BreakerPolicy) -> Result<(), RequestError> {
        if policy.threshold == 0 {
            return Ok(());
        }
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("breaker registry mutex poisoned");
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(BreakerEntry::new);
        match entry.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open { until } if now < until => Err(RequestError::CircuitOpen {
                key: key.to_string(),
                retry_at: until,
            }),
            BreakerState::Open { .. } => {
                entry.state = BreakerState::HalfOpen;
                entry.failures = 0;
                tracing::debug!(key, "circuit breaker half-open, admitting probe");
                Ok(())
            }
            BreakerState::HalfOpen => Err(RequestError::CircuitOpen {
                key: key.to_string(),
                retry_at: now + policy.reset_interval(),
            }),
        }
    }

    /// Record a successful call: the breaker closes and the failure count
    /// resets, whatever state it was in.
    pub fn record_success(&self, key: &str) {
        let mut entries = self.entries.lock().expect("breaker registry mutex poisoned");
        if let Some(entry) = entries.get_mut(key) {
            entry.state = BreakerState::Closed;
            entry.failures = 0;
        }
    }

    /// Record a failed call (retry-worthy response or transport error).
    pub fn record_failure(&self, key: &str, policy: &BreakerPolicy) {
        if policy.threshold == 0 {
            return;
        }
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("breaker registry mutex poisoned");
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(BreakerEntry::new);
        match entry.state {
            BreakerState::HalfOpen => {
                entry.state = BreakerState::Open {
                    until: now + policy.reset_interval(),
                };
                entry.failures = 0;
                metrics::record_breaker_open(key);
                tracing::warn!(key, "probe failed, circuit breaker re-opened");
            }
            BreakerState::Closed => {
                entry.failures += 1;
                if entry.failures >= policy.threshold {
                    entry.state = BreakerState::Open {
                        until: now + policy.reset_interval(),
                    };
                    metrics::record_breaker_open(key);
                    tracing::warn!(
                        key,
                        failures = entry.failures,
                        "failure threshold reached, circuit breaker opened"
                    );
                }
            }
            // Already open; a racing call under a shared key changes nothing.
            BreakerState::Open { .. } => {}
        }
    }

    /// Current consecutive-failure count for a key.
    pub fn failure_count(&self, key: &str) -> u32 {
        let entries = self.entries.lock().expect("breaker registry mutex poisoned");
        entries.get(key).map_or(0, |entry| entry.failures)
    }

    /// Drop one key's failure history.
    pub fn clear(&self, key: &str) {
        let mut entries = self.entries.lock().expect("breaker registry mutex poisoned");
        entries.remove(key);
    }

    /// Drop all failure history. Test isolation.
    pub fn clear_all(&self) {
        let mut entries = self.entries.lock().expect("breaker registry mutex poisoned");
        entries.clear();
    }
}
