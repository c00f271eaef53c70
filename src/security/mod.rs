//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound request:
//!     → ssrf.rs (screen hostname, then every DNS-resolved address)
//!     → Pass to the retry engine / transport
//! ```
//!
//! # Design Decisions
//! - Fail closed: any forbidden address rejects the whole request
//! - Screening happens before the transport is ever invoked
//! - No trust in hostnames; IP literals and DNS answers are both checked

pub mod ssrf;
