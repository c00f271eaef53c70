//! Injectable transport seam.
//!
//! # Design Decisions
//! - One-method trait so tests can script outcomes without sockets
//! - The production implementation wraps reqwest, which owns connection
//!   pooling and redirects; this crate never touches sockets directly
//! - Each attempt carries its own derived cancellation token

use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::Method;
use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

use crate::error::TransportError;

pub mod http;

pub use http::HttpTransport;

/// One outbound HTTP exchange handed to a [`Transport`].
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// Correlation id, generated per call and carried through logs.
    pub id: Uuid,

    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,

    /// Derived cancellation signal for this attempt. Implementations that
    /// spawn work should abort when it fires; futures dropped by the
    /// caller are cancelled either way.
    pub cancel: CancellationToken,

    /// Hard cap on response body bytes. Implementations stop reading and
    /// fail with [`TransportError::BodyTooLarge`] once exceeded.
    pub max_body_bytes: Option<usize>,
}

impl TransportRequest {
    /// A bare GET request; the pipeline fills in policy-driven fields.
    pub fn get(url: Url) -> Self {
        Self {
            id: Uuid::new_v4(),
            url,
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
            cancel: CancellationToken::new(),
            max_body_bytes: None,
        }
    }
}

/// The transport's view of a completed exchange.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE)?.to_str().ok()
    }
}

/// Seam between the request pipeline and actual socket I/O.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    enum Script {
        Status(u16),
        Full(TransportResponse),
        Error(TransportError),
        Hang,
    }

    /// Scriptable transport for unit tests: pops one scripted outcome per
    /// call.
    pub(crate) struct ScriptedTransport {
        script: Mutex<VecDeque<Script>>,
        calls: AtomicU32,
    }

    impl ScriptedTransport {
        fn with_script(script: VecDeque<Script>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: AtomicU32::new(0),
            }
        }

        pub(crate) fn statuses(statuses: &[u16]) -> Self {
            Self::with_script(statuses.iter().map(|&s| Script::Status(s)).collect())
        }

        pub(crate) fn errors(count: usize, make: impl Fn() -> TransportError) -> Self {
            Self::with_script((0..count).map(|_| Script::Error(make())).collect())
        }

        pub(crate) fn hanging() -> Self {
            Self::with_script(std::iter::once(Script::Hang).collect())
        }

        pub(crate) fn with_body(status: u16, content_type: &str, body: &str) -> Self {
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, content_type.parse().unwrap());
            Self::with_script(
                std::iter::once(Script::Full(TransportResponse {
                    status,
                    headers,
                    body: body.as_bytes().to_vec(),
                }))
                .collect(),
            )
        }

        pub(crate) fn json(body: &str) -> Self {
            Self::with_body(200, "application/json", body)
        }

        pub(crate) fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(
            &self,
            _request: TransportRequest,
        ) -> Result<TransportResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Script::Status(status)) => Ok(TransportResponse {
                    status,
                    headers: HeaderMap::new(),
                    body: Vec::new(),
                }),
                Some(Script::Full(response)) => Ok(response),
                Some(Script::Error(err)) => Err(err),
                Some(Script::Hang) => {
                    futures_util::future::pending::<()>().await;
                    unreachable!()
                }
                // Script exhausted: succeed.
                None => Ok(TransportResponse {
                    status: 200,
                    headers: HeaderMap::new(),
                    body: Vec::new(),
                }),
            }
        }
    }
}
