//! Text fetching for job-board pages and APIs.
//!
//! # Responsibilities
//! - Enforce the http/https protocol allowlist
//! - Queue per remote host and cap the response body size
//! - Decode by declared content type: HTML is normalized to plain text,
//!   everything else is trimmed as-is

use std::time::Duration;

use reqwest::header::HeaderMap;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::client::{perform_request, RequestOptions};
use crate::error::{RequestError, RequestResult, TransportError};
use crate::registry::Registry;
use crate::resilience::retry::RetryPolicy;
use crate::text::html::html_to_text;
use crate::transport::Transport;

/// Default body cap for fetched pages.
pub const DEFAULT_MAX_FETCH_BYTES: usize = 2 * 1024 * 1024;

/// Knobs for [`fetch_text`].
#[derive(Clone)]
pub struct FetchOptions {
    pub timeout: Option<Duration>,
    pub headers: HeaderMap,

    /// Hard cap on response body bytes.
    pub max_bytes: usize,

    pub retry: Option<RetryPolicy>,
    pub cancel: Option<CancellationToken>,

    /// Skip host screening. Only for targets the operator controls.
    pub allow_forbidden_hosts: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            headers: HeaderMap::new(),
            max_bytes: DEFAULT_MAX_FETCH_BYTES,
            retry: None,
            cancel: None,
            allow_forbidden_hosts: false,
        }
    }
}

/// Fetch a URL and return its textual content, queued per remote host.
///
/// HTML bodies (by declared content type) are normalized to plain text;
/// anything else is decoded as UTF-8 (lossily) and trimmed. Bodies larger
/// than `max_bytes` fail with [`RequestError::MaxBytesExceeded`]; partial
/// content is never returned.
pub async fn fetch_text(
    registry: &Registry,
    transport: &dyn Transport,
    url: &str,
    options: FetchOptions,
) -> RequestResult<String> {
    let url = Url::parse(url)?;
    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(RequestError::SchemeNotAllowed {
                scheme: scheme.to_string(),
            })
        }
    }
    let host = url
        .host_str()
        .ok_or(RequestError::InvalidUrl(url::ParseError::EmptyHost))?
        .to_string();

    let request_options = RequestOptions {
        headers: options.headers,
        timeout: options.timeout,
        retry: options.retry,
        rate_limit_key: Some(host),
        cancel: options.cancel,
        max_body_bytes: Some(options.max_bytes),
        allow_forbidden_hosts: options.allow_forbidden_hosts,
        ..RequestOptions::default()
    };

    let response = match perform_request(registry, transport, url, request_options).await {
        Ok(response) => response,
        // The transport bailed mid-read; surface it as the cap error.
        Err(RequestError::Transport(TransportError::BodyTooLarge { limit })) => {
            return Err(RequestError::MaxBytesExceeded { limit })
        }
        Err(err) => return Err(err),
    };

    // Scripted transports may ignore the cap; enforce it here too.
    if response.body.len() > options.max_bytes {
        return Err(RequestError::MaxBytesExceeded {
            limit: options.max_bytes,
        });
    }

    // Retries are spent by now; without the response to hand back, a
    // failing status has to surface as an error.
    if !response.is_success() {
        return Err(RequestError::UnexpectedStatus {
            status: response.status,
        });
    }

    let is_html = response
        .content_type()
        .map_or(false, |value| value.to_ascii_lowercase().contains("text/html"));
    let body = String::from_utf8_lossy(&response.body);
    if is_html {
        Ok(html_to_text(&body))
    } else {
        Ok(body.trim().to_string())
    }
}
