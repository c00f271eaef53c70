//! Shared coordination state for outbound calls.
//!
//! One `Registry` owns the three key-value stores the pipeline reads and
//! writes: host queues, rate limits, and circuit breakers. It is
//! constructed per client (or shared between clients that should share
//! throttle and failure history) and passed explicitly; tests build
//! isolated instances instead of resetting process-wide state.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::ClientConfig;
use crate::resilience::circuit_breaker::CircuitBreakerRegistry;
use crate::throttle::host_queue::HostQueueRegistry;
use crate::throttle::rate_limit::RateLimiterRegistry;

/// The three registries behind one outbound-call domain. Cloning is cheap
/// and shares the underlying state.
#[derive(Clone, Default)]
pub struct Registry {
    rate_limits: Arc<RateLimiterRegistry>,
    breakers: Arc<CircuitBreakerRegistry>,
    host_queues: HostQueueRegistry,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry with per-provider intervals from a config manifest.
    pub fn from_config(config: &ClientConfig) -> Self {
        let registry = Self::new();
        registry.apply_config(config);
        registry
    }

    /// Install the per-provider minimum intervals a config declares.
    pub fn apply_config(&self, config: &ClientConfig) {
        for (name, provider) in &config.providers {
            self.set_rate_limit(name, Duration::from_millis(provider.min_interval_ms), None);
        }
    }

    pub fn rate_limits(&self) -> &RateLimiterRegistry {
        &self.rate_limits
    }

    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    pub fn host_queues(&self) -> &HostQueueRegistry {
        &self.host_queues
    }

    /// See [`RateLimiterRegistry::set_rate_limit`].
    pub fn set_rate_limit(
        &self,
        key: &str,
        min_interval: Duration,
        last_invoked: Option<Instant>,
    ) {
        self.rate_limits.set_rate_limit(key, min_interval, last_invoked);
    }

    /// Remove every rate-limit entry. Test isolation.
    pub fn clear_all_rate_limits(&self) {
        self.rate_limits.clear_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;

    #[tokio::test(start_paused = true)]
    async fn test_from_config_installs_provider_intervals() {
        let mut config = ClientConfig::default();
        config.providers.insert(
            "greenhouse".to_string(),
            ProviderConfig {
                min_interval_ms: 750,
                ..ProviderConfig::default()
            },
        );

        let registry = Registry::from_config(&config);
        let now = Instant::now();
        registry.rate_limits().mark_invoked("greenhouse", now);
        assert_eq!(
            registry.rate_limits().next_delay("greenhouse", now),
            Duration::from_millis(750)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_instances_are_isolated() {
        let a = Registry::new();
        let b = Registry::new();
        a.set_rate_limit("k", Duration::from_millis(100), Some(Instant::now()));
        assert_eq!(b.rate_limits().next_delay("k", Instant::now()), Duration::ZERO);
    }
}
