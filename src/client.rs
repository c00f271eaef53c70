//! Request pipeline and the provider-bound client.
//!
//! # Data Flow
//! ```text
//! perform_request:
//!     → host queue (acquire ticket, wait for prior same-key call)
//!     → rate limiter (sleep out the remaining interval, stamp start)
//!     → SSRF guard (screen hostname + resolved addresses, pre-flight)
//!     → retry engine (breaker admission, deadline, transport attempts)
//! ```
//!
//! # Design Decisions
//! - The queue ticket is held across the whole call and released by drop,
//!   so cancelled and failed calls still unblock the next waiter
//! - Registry reads and writes never cross an await while locked
//! - A `Client` only fills in defaults; per-call options always win

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use url::Url;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::{RequestError, RequestResult};
use crate::fetch::{self, FetchOptions};
use crate::observability::metrics;
use crate::registry::Registry;
use crate::resilience::circuit_breaker::BreakerPolicy;
use crate::resilience::retry::{self, AttemptContext, RetryPolicy, ShouldRetry};
use crate::security::ssrf;
use crate::transport::{HttpTransport, Transport, TransportRequest, TransportResponse};

/// Per-call knobs; unset fields fall back to client defaults, then to
/// crate defaults.
#[derive(Clone, Default)]
pub struct RequestOptions {
    pub method: Option<Method>,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,

    /// Per-attempt deadline.
    pub timeout: Option<Duration>,

    pub retry: Option<RetryPolicy>,
    pub should_retry: Option<ShouldRetry>,

    /// Key for queueing and rate limiting; defaults to the provider name
    /// (via `Client`) or the remote host.
    pub rate_limit_key: Option<String>,

    pub breaker: Option<BreakerPolicy>,
    /// Breaker key; defaults to the rate-limit key.
    pub breaker_key: Option<String>,

    /// External cancellation for the whole call.
    pub cancel: Option<CancellationToken>,

    /// Hard cap on response body bytes enforced inside the transport.
    pub max_body_bytes: Option<usize>,

    /// Skip host screening. Only for targets the operator controls, such
    /// as loopback fixtures in tests or in-cluster sidecars.
    pub allow_forbidden_hosts: bool,
}

/// Drive one request through the full pipeline: serialization, rate
/// limiting, SSRF screening, breaker admission, retries, and timeout
/// composition. Returns the transport's final response (which may still
/// carry a retry-worthy status once attempts are exhausted) or the first
/// non-retryable error.
pub async fn perform_request(
    registry: &Registry,
    transport: &dyn Transport,
    url: Url,
    options: RequestOptions,
) -> RequestResult<TransportResponse> {
    let host = url
        .host_str()
        .ok_or(RequestError::InvalidUrl(url::ParseError::EmptyHost))?
        .to_string();
    let queue_key = options
        .rate_limit_key
        .clone()
        .unwrap_or_else(|| host.clone());
    let breaker_key = options
        .breaker_key
        .clone()
        .unwrap_or_else(|| queue_key.clone());
    let id = Uuid::new_v4();
    let span = tracing::debug_span!(
        "outbound_request",
        request_id = %id,
        url = %url,
        key = %queue_key,
    );

    async move {
        let mut ticket = registry.host_queues().acquire(&queue_key);
        ticket.wait_turn().await;

        let wait = registry.rate_limits().next_delay(&queue_key, Instant::now());
        if !wait.is_zero() {
            metrics::record_rate_limited(&queue_key);
            tracing::trace!(wait_ms = wait.as_millis() as u64, "rate limit wait");
            tokio::time::sleep(wait).await;
        }
        // Stamp the instant the task actually starts, post-wait.
        registry.rate_limits().mark_invoked(&queue_key, Instant::now());

        if !options.allow_forbidden_hosts {
            let port = url.port_or_known_default().unwrap_or(443);
            ssrf::ensure_resolved_public(&host, port).await?;
        }

        let request = TransportRequest {
            id,
            url,
            method: options.method.clone().unwrap_or(Method::GET),
            headers: options.headers.clone(),
            body: options.body.clone(),
            cancel: CancellationToken::new(),
            max_body_bytes: options.max_body_bytes,
        };
        let context = AttemptContext {
            transport,
            breakers: registry.breakers(),
            breaker_key: &breaker_key,
            breaker: options.breaker.unwrap_or_else(BreakerPolicy::disabled),
            policy: options.retry.unwrap_or_default(),
            should_retry: options.should_retry.as_ref(),
            deadline: options.timeout,
            cancel: options.cancel.as_ref(),
        };

        let result = retry::run(context, &request).await;
        if let Ok(response) = &result {
            metrics::record_request(&queue_key, response.status);
        }
        result
        // Ticket drops here; the next queued caller proceeds.
    }
    .instrument(span)
    .await
}

/// Provider defaults baked into a [`Client`].
#[derive(Clone)]
struct ClientDefaults {
    headers: HeaderMap,
    retry: RetryPolicy,
    timeout: Option<Duration>,
    breaker: BreakerPolicy,
}

/// A request pipeline bound to one provider's defaults.
#[derive(Clone)]
pub struct Client {
    provider: String,
    registry: Registry,
    transport: Arc<dyn Transport>,
    defaults: ClientDefaults,
}

impl Client {
    pub fn builder(provider: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(provider)
    }

    /// Build a provider client from a config manifest; unknown providers
    /// get the manifest's global defaults.
    pub fn from_config(provider: impl Into<String>, config: &ClientConfig) -> ClientBuilder {
        let provider = provider.into();
        let mut builder = ClientBuilder::new(provider.clone())
            .retry_policy(config.retry)
            .circuit_breaker(config.circuit_breaker)
            .timeout(Duration::from_millis(config.fetch.timeout_ms));
        if let Some(settings) = config.providers.get(&provider) {
            builder = builder.rate_limit(Duration::from_millis(settings.min_interval_ms));
            for (name, value) in &settings.headers {
                builder = builder.header(name, value);
            }
        }
        builder
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Issue a request with the client's defaults merged under `options`.
    pub async fn request(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> RequestResult<TransportResponse> {
        let url = Url::parse(url)?;
        let merged = self.merge(options);
        perform_request(&self.registry, self.transport.as_ref(), url, merged).await
    }

    /// Issue a request and decode the body as JSON. The body is decoded
    /// whatever the status; callers who care should check the status on
    /// [`Client::request`] instead.
    pub async fn json<T: DeserializeOwned>(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> RequestResult<T> {
        let response = self.request(url, options).await?;
        serde_json::from_slice(&response.body).map_err(|err| RequestError::Decode(err.to_string()))
    }

    /// Fetch a page and decode it to text; see [`fetch::fetch_text`].
    pub async fn fetch_text(&self, url: &str, options: FetchOptions) -> RequestResult<String> {
        fetch::fetch_text(&self.registry, self.transport.as_ref(), url, options).await
    }

    fn merge(&self, mut options: RequestOptions) -> RequestOptions {
        let mut headers = self.defaults.headers.clone();
        for (name, value) in &options.headers {
            headers.insert(name.clone(), value.clone());
        }
        options.headers = headers;
        options.timeout = options.timeout.or(self.defaults.timeout);
        options.retry = options.retry.or(Some(self.defaults.retry));
        options.breaker = options.breaker.or(Some(self.defaults.breaker));
        if options.rate_limit_key.is_none() {
            options.rate_limit_key = Some(self.provider.clone());
        }
        options
    }
}

/// Builder for [`Client`].
pub struct ClientBuilder {
    provider: String,
    registry: Option<Registry>,
    transport: Option<Arc<dyn Transport>>,
    headers: HeaderMap,
    retry: RetryPolicy,
    timeout: Option<Duration>,
    breaker: BreakerPolicy,
    rate_limit: Option<Duration>,
}

impl ClientBuilder {
    fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            registry: None,
            transport: None,
            headers: HeaderMap::new(),
            retry: RetryPolicy::default(),
            timeout: Some(Duration::from_secs(30)),
            breaker: BreakerPolicy::default(),
            rate_limit: None,
        }
    }

    /// Share coordination state with other clients; defaults to a fresh
    /// registry.
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Header attached to every request; invalid names or values are
    /// dropped with a warning rather than failing the build.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            name.parse::<HeaderName>(),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => {
                tracing::warn!(header = name, "dropping malformed default header");
            }
        }
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn circuit_breaker(mut self, breaker: BreakerPolicy) -> Self {
        self.breaker = breaker;
        self
    }

    /// Minimum spacing between requests under this provider's key.
    pub fn rate_limit(mut self, min_interval: Duration) -> Self {
        self.rate_limit = Some(min_interval);
        self
    }

    pub fn build(self) -> Client {
        let registry = self.registry.unwrap_or_default();
        if let Some(interval) = self.rate_limit {
            registry.set_rate_limit(&self.provider, interval, None);
        }
        Client {
            provider: self.provider,
            registry,
            transport: self
                .transport
                .unwrap_or_else(|| Arc::new(HttpTransport::new())),
            defaults: ClientDefaults {
                headers: self.headers,
                retry: self.retry,
                timeout: self.timeout,
                breaker: self.breaker,
            },
        }
    }
}
