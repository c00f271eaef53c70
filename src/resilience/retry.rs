//! Retry engine for transient outbound failures.
//!
//! # Responsibilities
//! - Decide whether an outcome is retry-worthy (429/5xx, transient errors)
//! - Re-run attempts with exponential backoff
//! - Feed every outcome into the circuit breaker at the call's key
//!
//! # Design Decisions
//! - Exhausted retries hand the last retry-worthy response back to the
//!   caller unchanged; callers inspect the status themselves
//! - Errors marked do-not-retry (external cancellation, pre-flight
//!   rejections) propagate on first occurrence
//! - Breaker admission is re-checked before every attempt

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{RequestError, RequestResult};
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::circuit_breaker::{BreakerPolicy, CircuitBreakerRegistry};
use crate::resilience::timeout::with_deadline;
use crate::transport::{Transport, TransportRequest, TransportResponse};

/// Retry tuning for one call.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the initial attempt; 3 means up to 4 transport calls.
    pub retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Multiplier applied per attempt.
    pub factor: f64,

    /// Cap on the computed delay in milliseconds; `None` leaves it
    /// unbounded.
    pub max_delay_ms: Option<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            base_delay_ms: 100,
            factor: 2.0,
            max_delay_ms: Some(2_000),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            retries: 0,
            ..Self::default()
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base_delay_ms, self.factor, self.max_delay_ms)
    }
}

/// Caller-supplied response classifier; the default treats HTTP 429 and
/// any 5xx as retry-worthy.
pub type ShouldRetry = Arc<dyn Fn(&TransportResponse) -> bool + Send + Sync>;

pub fn default_should_retry(response: &TransportResponse) -> bool {
    response.status == 429 || response.status >= 500
}

/// Everything one attempt loop needs, borrowed from the call site.
pub(crate) struct AttemptContext<'a> {
    pub transport: &'a dyn Transport,
    pub breakers: &'a CircuitBreakerRegistry,
    pub breaker_key: &'a str,
    pub breaker: BreakerPolicy,
    pub policy: RetryPolicy,
    pub should_retry: Option<&'a ShouldRetry>,
    pub deadline: Option<Duration>,
    pub cancel: Option<&'a CancellationToken>,
}

impl AttemptContext<'_> {
    fn is_retry_worthy(&self, response: &TransportResponse) -> bool {
        match self.should_retry {
            Some(classify) => classify(response),
            None => default_should_retry(response),
        }
    }
}

/// Execute the attempt loop for one request.
pub(crate) async fn run(
    ctx: AttemptContext<'_>,
    request: &TransportRequest,
) -> RequestResult<TransportResponse> {
    let mut attempt: u32 = 0;
    loop {
        ctx.breakers.admit(ctx.breaker_key, &ctx.breaker)?;

        let outcome = with_deadline(ctx.deadline, ctx.cancel, |token| {
            let mut attempt_request = request.clone();
            attempt_request.cancel = token;
            let transport = ctx.transport;
            async move {
                transport
                    .send(attempt_request)
                    .await
                    .map_err(RequestError::from)
            }
        })
        .await;

        match outcome {
            Ok(response) if ctx.is_retry_worthy(&response) => {
                ctx.breakers.record_failure(ctx.breaker_key, &ctx.breaker);
                if attempt < ctx.policy.retries {
                    let delay = ctx.policy.delay_for_attempt(attempt);
                    metrics::record_retry(ctx.breaker_key);
                    tracing::debug!(
                        request_id = %request.id,
                        status = response.status,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retry-worthy response, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                // Attempts exhausted: the caller gets the final response,
                // not an error.
                tracing::debug!(
                    request_id = %request.id,
                    status = response.status,
                    "retries exhausted, surfacing last response"
                );
                return Ok(response);
            }
            Ok(response) => {
                ctx.breakers.record_success(ctx.breaker_key);
                return Ok(response);
            }
            Err(err) if err.do_not_retry() => return Err(err),
            Err(err) => {
                ctx.breakers.record_failure(ctx.breaker_key, &ctx.breaker);
                if attempt < ctx.policy.retries {
                    let delay = ctx.policy.delay_for_attempt(attempt);
                    metrics::record_retry(ctx.breaker_key);
                    tracing::debug!(
                        request_id = %request.id,
                        error = %err,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "transient error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::transport::tests::ScriptedTransport;
    use tokio::time::Instant;

    fn request() -> TransportRequest {
        TransportRequest::get("https://api.example.com/jobs".parse().unwrap())
    }

    fn ctx<'a>(
        transport: &'a ScriptedTransport,
        breakers: &'a CircuitBreakerRegistry,
        policy: RetryPolicy,
    ) -> AttemptContext<'a> {
        AttemptContext {
            transport,
            breakers,
            breaker_key: "api.example.com",
            breaker: BreakerPolicy::disabled(),
            policy,
            should_retry: None,
            deadline: None,
            cancel: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let transport = ScriptedTransport::statuses(&[503, 503, 200]);
        let breakers = CircuitBreakerRegistry::new();

        let response = run(ctx(&transport, &breakers, RetryPolicy::default()), &request())
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_return_last_response() {
        let transport = ScriptedTransport::statuses(&[429, 429, 429]);
        let breakers = CircuitBreakerRegistry::new();
        let policy = RetryPolicy {
            retries: 2,
            ..RetryPolicy::default()
        };

        let response = run(ctx(&transport, &breakers, policy), &request())
            .await
            .unwrap();
        assert_eq!(response.status, 429);
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_spacing() {
        let transport = ScriptedTransport::statuses(&[500, 500, 500, 200]);
        let breakers = CircuitBreakerRegistry::new();
        let policy = RetryPolicy {
            retries: 3,
            base_delay_ms: 100,
            factor: 2.0,
            max_delay_ms: Some(300),
        };

        let started = Instant::now();
        let response = run(ctx(&transport, &breakers, policy), &request())
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        // 100 + 200 + 300 of pure backoff under the paused clock.
        assert_eq!(started.elapsed().as_millis(), 600);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_error_retried_then_rethrown() {
        let transport = ScriptedTransport::errors(3, || {
            TransportError::Connect("connection refused".into())
        });
        let breakers = CircuitBreakerRegistry::new();
        let policy = RetryPolicy {
            retries: 2,
            ..RetryPolicy::default()
        };

        let err = run(ctx(&transport, &breakers, policy), &request())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RequestError::Transport(TransportError::Connect(_))
        ));
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_feed_breaker_and_open_it() {
        let transport = ScriptedTransport::statuses(&[500, 500, 500]);
        let breakers = CircuitBreakerRegistry::new();
        let mut context = ctx(
            &transport,
            &breakers,
            RetryPolicy {
                retries: 4,
                ..RetryPolicy::default()
            },
        );
        context.breaker = BreakerPolicy {
            threshold: 3,
            reset_ms: 60_000,
        };

        // The third failure opens the breaker; the fourth attempt is
        // rejected before touching the transport.
        let err = run(context, &request()).await.unwrap_err();
        assert!(matches!(err, RequestError::CircuitOpen { .. }));
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_classifier_overrides_default() {
        let transport = ScriptedTransport::statuses(&[404, 404, 200]);
        let breakers = CircuitBreakerRegistry::new();
        let classify: ShouldRetry = Arc::new(|response| response.status == 404);
        let mut context = ctx(&transport, &breakers, RetryPolicy::default());
        context.should_retry = Some(&classify);

        let response = run(context, &request()).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_caller_bypasses_retry() {
        let transport = ScriptedTransport::hanging();
        let breakers = CircuitBreakerRegistry::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut context = ctx(&transport, &breakers, RetryPolicy::default());
        context.cancel = Some(&cancel);

        let err = run(context, &request()).await.unwrap_err();
        assert!(err.do_not_retry());
        assert!(transport.calls() <= 1);
    }
}
