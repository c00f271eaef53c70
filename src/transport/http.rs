//! Production transport backed by reqwest.
//!
//! # Design Decisions
//! - Connection pooling, TLS, and redirect following belong to reqwest;
//!   this wrapper only maps types and enforces the body byte cap
//! - The response body is read in chunks so an oversized body is rejected
//!   without buffering the remainder
//! - The attempt's cancellation token is observed at every await, so a
//!   cancelled attempt stops sending or reading immediately

use async_trait::async_trait;

use crate::error::TransportError;
use crate::transport::{Transport, TransportRequest, TransportResponse};

/// [`Transport`] implementation over a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Wrap a pre-configured client (custom TLS, proxy, user agent).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = request.body.clone() {
            builder = builder.body(body);
        }

        let mut response = tokio::select! {
            result = builder.send() => result.map_err(map_send_error)?,
            () = request.cancel.cancelled() => return Err(TransportError::Aborted),
        };

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let mut body = Vec::new();
        loop {
            let chunk = tokio::select! {
                chunk = response.chunk() => {
                    chunk.map_err(|err| TransportError::Body(err.to_string()))?
                }
                () = request.cancel.cancelled() => return Err(TransportError::Aborted),
            };
            match chunk {
                Some(bytes) => {
                    if let Some(limit) = request.max_body_bytes {
                        if body.len() + bytes.len() > limit {
                            return Err(TransportError::BodyTooLarge { limit });
                        }
                    }
                    body.extend_from_slice(&bytes);
                }
                None => break,
            }
        }

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

fn map_send_error(err: reqwest::Error) -> TransportError {
    if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}
