//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound attempt:
//!     → circuit_breaker.rs (admit or fail fast per key)
//!     → timeout.rs (compose external cancellation + deadline into one token)
//!     → transport call
//!     → On failure: retry.rs (classify, back off via backoff.rs, retry)
//!     → Outcome recorded back into circuit_breaker.rs
//! ```
//!
//! # Design Decisions
//! - Every attempt re-checks breaker admission; a breaker opened by this
//!   call's own failures stops the remaining attempts
//! - Backoff is deterministic (no jitter); the spacing is contract-tested
//! - Exhausted retries surface the last response unchanged, never an error
//! - All timeout/cancellation outcomes normalize to one error kind

pub mod backoff;
pub mod circuit_breaker;
pub mod retry;
pub mod timeout;
