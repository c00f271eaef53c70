//! Metrics recording.
//!
//! # Metrics
//! - `jobwire_requests_total` (counter): completed requests by key, status
//! - `jobwire_retries_total` (counter): backoff retries by key
//! - `jobwire_rate_limited_total` (counter): calls that waited on a key
//! - `jobwire_breaker_open_total` (counter): breaker open transitions
//! - `jobwire_ssrf_rejected_total` (counter): screened-out requests
//!
//! # Design Decisions
//! - The metrics facade only; the embedding application installs the
//!   recorder/exporter of its choice
//! - No per-host labels beyond the caller-chosen key, keeping cardinality
//!   under the caller's control

/// Record a completed request and its final status.
pub fn record_request(key: &str, status: u16) {
    metrics::counter!(
        "jobwire_requests_total",
        "key" => key.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record one backoff retry.
pub fn record_retry(key: &str) {
    metrics::counter!("jobwire_retries_total", "key" => key.to_string()).increment(1);
}

/// Record a call that had to wait out a rate-limit interval.
pub fn record_rate_limited(key: &str) {
    metrics::counter!("jobwire_rate_limited_total", "key" => key.to_string()).increment(1);
}

/// Record a breaker transitioning to open.
pub fn record_breaker_open(key: &str) {
    metrics::counter!("jobwire_breaker_open_total", "key" => key.to_string()).increment(1);
}

/// Record a request rejected by the SSRF guard.
pub fn record_ssrf_rejected() {
    metrics::counter!("jobwire_ssrf_rejected_total").increment(1);
}
