//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters via the metrics facade)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line of a call
//! - Counters are cheap; the embedding application decides whether and
//!   how to export them
//! - Logging init lives here so binaries share one setup

pub mod logging;
pub mod metrics;
