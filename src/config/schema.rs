//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! outbound request layer. All types derive Serde traits for
//! deserialization from config files.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::resilience::circuit_breaker::BreakerPolicy;
use crate::resilience::retry::RetryPolicy;

/// Root configuration for the outbound request layer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Retry policy applied when a call does not override it.
    pub retry: RetryPolicy,

    /// Circuit breaker policy applied when a call does not override it.
    pub circuit_breaker: BreakerPolicy,

    /// Page/API fetching limits.
    pub fetch: FetchConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Per-provider throttles and headers, keyed by provider name.
    pub providers: HashMap<String, ProviderConfig>,
}

/// Fetching limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Per-attempt deadline in milliseconds.
    pub timeout_ms: u64,

    /// Maximum response body size in bytes.
    pub max_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Per-provider settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProviderConfig {
    /// Minimum spacing between successive requests to this provider in
    /// milliseconds. 0 disables throttling.
    pub min_interval_ms: u64,

    /// Headers attached to every request to this provider.
    pub headers: HashMap<String, String>,
}
