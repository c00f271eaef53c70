//! Throttling subsystem.
//!
//! # Data Flow
//! ```text
//! Caller:
//!     → host_queue.rs (acquire ticket, wait for prior same-key task)
//!     → rate_limit.rs (sleep out the remaining inter-request interval)
//!     → attempt runs; ticket drop releases the next waiter
//! ```
//!
//! # Design Decisions
//! - Strict FIFO per key: tickets run in acquisition order, never
//!   overlapping; distinct keys are fully independent
//! - One in-flight attempt per key means same-key rate-limit state is
//!   never read and written concurrently
//! - Idle keys are reclaimed when their last ticket settles

pub mod host_queue;
pub mod rate_limit;
