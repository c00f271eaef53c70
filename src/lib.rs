//! jobwire — hardened outbound request layer for job-board ingestion.
//!
//! Every outbound call to a third-party job board or API flows through
//! one pipeline:
//!
//! ```text
//! caller
//!   → throttle::host_queue   (strict FIFO per key, one in flight)
//!   → throttle::rate_limit   (minimum inter-request interval)
//!   → security::ssrf         (hostname + resolved-address screening)
//!   → resilience::retry      (backoff, breaker admission per attempt)
//!   → resilience::timeout    (deadline + cancellation, one derived token)
//!   → transport              (injectable; reqwest in production)
//! ```
//!
//! Job-board adapters, scoring, and persistence live elsewhere and
//! consume this crate through [`Client`], [`perform_request`], and
//! [`fetch_text`].

pub mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod observability;
pub mod registry;
pub mod resilience;
pub mod security;
pub mod text;
pub mod throttle;
pub mod transport;

pub use client::{perform_request, Client, ClientBuilder, RequestOptions};
pub use config::ClientConfig;
pub use error::{RequestError, RequestResult, TimeoutSource, TransportError};
pub use fetch::{fetch_text, FetchOptions};
pub use registry::Registry;
pub use resilience::circuit_breaker::BreakerPolicy;
pub use resilience::retry::{default_should_retry, RetryPolicy, ShouldRetry};
pub use text::html_to_text;
pub use transport::{HttpTransport, Transport, TransportRequest, TransportResponse};
