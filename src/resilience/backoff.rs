//! Exponential backoff between retry attempts.

use std::time::Duration;

/// Calculate the delay before re-running a failed attempt.
///
/// `attempt` is the zero-based index of the attempt that just failed:
/// `base_ms * factor^attempt`, capped at `max_ms` when set.
pub fn calculate_backoff(attempt: u32, base_ms: u64, factor: f64, max_ms: Option<u64>) -> Duration {
    let factor = if factor >= 1.0 { factor } else { 1.0 };
    let raw = base_ms as f64 * factor.powi(attempt as i32);
    let capped = match max_ms {
        Some(max) => raw.min(max as f64),
        None => raw,
    };
    // Float-to-int casts saturate, so unbounded growth stays well-defined.
    Duration::from_millis(capped as u64)
}
