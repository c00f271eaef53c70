//! Timeout and cancellation composition.
//!
//! # Responsibilities
//! - Merge the caller's cancellation token with the per-attempt deadline
//!   into exactly one derived token handed to the transport
//! - Guarantee the derived token is cancelled on every exit path, so a
//!   transport observing it (or work spawned from it) is always released
//!
//! # Design Decisions
//! - Whichever of {completion, external cancellation, deadline} settles
//!   first is terminal; the losing futures are dropped in place
//! - Both deadline expiry and external cancellation surface as the same
//!   error kind; only the retry classification differs

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{RequestError, TimeoutSource};

/// Run one attempt under a composed cancellation scope.
///
/// `attempt` receives the derived token; the future it returns races the
/// deadline timer and the external token. Cleanup is by drop on all paths,
/// so no timer or listener survives the call.
pub(crate) async fn with_deadline<T, F, Fut>(
    deadline: Option<Duration>,
    external: Option<&CancellationToken>,
    attempt: F,
) -> Result<T, RequestError>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, RequestError>>,
{
    let derived = match external {
        Some(token) => token.child_token(),
        None => CancellationToken::new(),
    };
    // Cancel the derived token on every exit path.
    let _guard = derived.clone().drop_guard();

    let fut = attempt(derived.clone());
    tokio::pin!(fut);

    match deadline {
        Some(limit) => {
            tokio::select! {
                result = &mut fut => result,
                () = tokio::time::sleep(limit) => Err(RequestError::Timeout {
                    source: TimeoutSource::Deadline(limit),
                }),
                () = derived.cancelled() => Err(RequestError::Timeout {
                    source: TimeoutSource::Cancelled,
                }),
            }
        }
        None => {
            tokio::select! {
                result = &mut fut => result,
                () = derived.cancelled() => Err(RequestError::Timeout {
                    source: TimeoutSource::Cancelled,
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_fires() {
        let result: Result<(), _> = with_deadline(
            Some(Duration::from_millis(100)),
            None,
            |_token| futures_util::future::pending(),
        )
        .await;
        match result.unwrap_err() {
            RequestError::Timeout {
                source: TimeoutSource::Deadline(limit),
            } => assert_eq!(limit.as_millis(), 100),
            other => panic!("expected deadline timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_cancellation_wins() {
        let external = CancellationToken::new();
        let cancel = external.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });

        let result: Result<(), _> = with_deadline(
            Some(Duration::from_secs(10)),
            Some(&external),
            |_token| futures_util::future::pending(),
        )
        .await;
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            RequestError::Timeout {
                source: TimeoutSource::Cancelled,
            }
        ));
        assert!(err.do_not_retry());
    }

    #[tokio::test(start_paused = true)]
    async fn test_natural_completion_passes_through() {
        let result = with_deadline(Some(Duration::from_secs(1)), None, |_token| async {
            Ok::<_, RequestError>(42)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_derived_token_cancelled_on_exit() {
        let observed = Arc::new(AtomicBool::new(false));
        let seen = observed.clone();

        let result: Result<(), _> =
            with_deadline(Some(Duration::from_millis(10)), None, move |token| {
                tokio::spawn(async move {
                    token.cancelled().await;
                    seen.store(true, Ordering::SeqCst);
                });
                futures_util::future::pending()
            })
            .await;
        assert!(result.is_err());

        // Spawned observer sees the derived token cancelled by the guard.
        tokio::task::yield_now().await;
        assert!(observed.load(Ordering::SeqCst));
    }
}
