//! Per-key minimum inter-request intervals.
//!
//! # Responsibilities
//! - Track the last invocation instant per key
//! - Tell the host queue how long a dequeued task must still wait
//!
//! # Design Decisions
//! - A zero interval removes the entry (no throttling)
//! - The last-invoked stamp only ever advances; seeds and marks that
//!   would move it backwards are ignored

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    min_interval: Duration,
    last_invoked: Option<Instant>,
}

/// Registry of inter-request intervals, keyed by caller-chosen strings
/// (typically a provider name or remote host).
#[derive(Debug, Default)]
pub struct RateLimiterRegistry {
    entries: Mutex<HashMap<String, RateLimitEntry>>,
}

impl RateLimiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or update the interval for `key`. `Duration::ZERO` removes
    /// the entry. A `last_invoked` seed is applied only if it is later
    /// than the stored stamp.
    pub fn set_rate_limit(
        &self,
        key: &str,
        min_interval: Duration,
        last_invoked: Option<Instant>,
    ) {
        let mut entries = self.entries.lock().expect("rate limiter mutex poisoned");
        if min_interval.is_zero() {
            entries.remove(key);
            return;
        }
        let entry = entries
            .entry(key.to_string())
            .or_insert(RateLimitEntry {
                min_interval,
                last_invoked: None,
            });
        entry.min_interval = min_interval;
        if let Some(seed) = last_invoked {
            if entry.last_invoked.map_or(true, |current| seed > current) {
                entry.last_invoked = Some(seed);
            }
        }
    }

    /// Remove every entry. Test isolation.
    pub fn clear_all(&self) {
        let mut entries = self.entries.lock().expect("rate limiter mutex poisoned");
        entries.clear();
    }

    /// How much longer a task under `key` must wait before starting.
    pub fn next_delay(&self, key: &str, now: Instant) -> Duration {
        let entries = self.entries.lock().expect("rate limiter mutex poisoned");
        match entries.get(key) {
            Some(entry) => match entry.last_invoked {
                Some(last) => {
                    let ready_at = last + entry.min_interval;
                    if now < ready_at {
                        ready_at - now
                    } else {
                        Duration::ZERO
                    }
                }
                None => Duration::ZERO,
            },
            None => Duration::ZERO,
        }
    }

    /// Stamp the instant a task under `key` actually started.
    pub fn mark_invoked(&self, key: &str, now: Instant) {
        let mut entries = self.entries.lock().expect("rate limiter mutex poisoned");
        if let Some(entry) = entries.get_mut(key) {
            if entry.last_invoked.map_or(true, |current| now > current) {
                entry.last_invoked = Some(now);
            }
        }
    }
}
