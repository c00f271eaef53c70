//! Error taxonomy for the outbound request layer.
//!
//! Callers receive the final response or error unchanged after the retry
//! loop is exhausted; the only normalization is that deadline expiry and
//! external cancellation both surface as [`RequestError::Timeout`].

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

/// Raw failure from the underlying transport call.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Name resolution failed in a way other than "name not found".
    #[error("DNS resolution failed for {host}: {message}")]
    Dns { host: String, message: String },

    /// The response body could not be read.
    #[error("failed reading response body: {0}")]
    Body(String),

    /// The response body exceeded the configured byte cap mid-read.
    #[error("response body exceeded {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// The attempt was aborted via its cancellation token.
    #[error("request aborted")]
    Aborted,

    /// Any other transport failure.
    #[error("{0}")]
    Other(String),
}

/// What terminated a timed-out attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutSource {
    /// The internally armed deadline elapsed.
    Deadline(Duration),
    /// The caller's cancellation token fired first.
    Cancelled,
}

impl fmt::Display for TimeoutSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutSource::Deadline(limit) => {
                write!(f, "deadline of {} ms elapsed", limit.as_millis())
            }
            TimeoutSource::Cancelled => write!(f, "cancelled by caller"),
        }
    }
}

impl std::error::Error for TimeoutSource {}

/// Errors surfaced by the request pipeline.
#[derive(Debug, Error)]
pub enum RequestError {
    /// Raw failure from the underlying call.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The attempt timed out or was cancelled. Always this kind, whether
    /// the deadline was internal or the cancellation came from outside.
    #[error("request timed out: {source}")]
    Timeout { source: TimeoutSource },

    /// The circuit breaker for this key is open; no transport call was made.
    #[error("circuit breaker open for {key}, retry at {retry_at:?}")]
    CircuitOpen { key: String, retry_at: Instant },

    /// The target host resolved to a non-public address; no transport call
    /// was made.
    #[error("refusing request to {host}: address {address} is not public")]
    SsrfRejected { host: String, address: String },

    /// The response body exceeded the configured cap.
    #[error("response body exceeded {limit} bytes")]
    MaxBytesExceeded { limit: usize },

    /// The URL scheme is outside the http/https allowlist.
    #[error("scheme {scheme:?} is not allowed")]
    SchemeNotAllowed { scheme: String },

    /// The final response carried a non-success status. Only surfaced by
    /// callers that cannot hand the response back, such as `fetch_text`.
    #[error("unexpected status {status}")]
    UnexpectedStatus { status: u16 },

    /// The URL could not be parsed or is missing a host.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The response body could not be decoded into the requested shape.
    #[error("failed to decode response body: {0}")]
    Decode(String),
}

impl RequestError {
    /// Errors that must bypass the retry loop on first occurrence.
    ///
    /// Externally cancelled attempts, pre-flight rejections, and body-cap
    /// breaches are never transient: repeating the call cannot change the
    /// outcome, or the caller has asked us to stop.
    pub fn do_not_retry(&self) -> bool {
        match self {
            RequestError::Timeout {
                source: TimeoutSource::Cancelled,
            } => true,
            RequestError::Timeout { .. } => false,
            RequestError::Transport(TransportError::BodyTooLarge { .. }) => true,
            RequestError::Transport(TransportError::Aborted) => true,
            RequestError::Transport(_) => false,
            RequestError::CircuitOpen { .. }
            | RequestError::SsrfRejected { .. }
            | RequestError::MaxBytesExceeded { .. }
            | RequestError::SchemeNotAllowed { .. }
            | RequestError::UnexpectedStatus { .. }
            | RequestError::InvalidUrl(_)
            | RequestError::Decode(_) => true,
        }
    }
}

/// Result type for pipeline operations.
pub type RequestResult<T> = Result<T, RequestError>;
