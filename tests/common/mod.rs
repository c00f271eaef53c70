//! Shared utilities for integration testing.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::Instant;

use jobwire::{Transport, TransportError, TransportRequest, TransportResponse};

/// One scripted transport outcome.
#[allow(dead_code)]
pub enum Step {
    /// Respond immediately with this status and an empty body.
    Status(u16),
    /// Respond with this status after a delay.
    StatusAfter(Duration, u16),
    /// Fail with a connection error.
    Fail,
    /// Never settle; the caller's timeout or cancellation must fire.
    Hang,
}

/// Scriptable transport: pops one step per call, records invocation
/// instants and the peak number of overlapping calls.
#[allow(dead_code)]
#[derive(Default)]
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicU32,
    in_flight: AtomicU32,
    max_in_flight: AtomicU32,
    invocations: Mutex<Vec<Instant>>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> u32 {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn invocations(&self) -> Vec<Instant> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, _request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.invocations.lock().unwrap().push(Instant::now());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let step = self.steps.lock().unwrap().pop_front();
        let result = match step {
            Some(Step::Status(status)) => Ok(response(status)),
            Some(Step::StatusAfter(delay, status)) => {
                tokio::time::sleep(delay).await;
                Ok(response(status))
            }
            Some(Step::Fail) => Err(TransportError::Connect("connection refused".into())),
            Some(Step::Hang) => {
                // Counts as permanently in flight; callers must cancel.
                futures_util::future::pending::<()>().await;
                unreachable!()
            }
            None => Ok(response(200)),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn response(status: u16) -> TransportResponse {
    TransportResponse {
        status,
        headers: HeaderMap::new(),
        body: Vec::new(),
    }
}

/// Start a mock backend that returns a fixed response, bound to an
/// ephemeral loopback port.
#[allow(dead_code)]
pub async fn start_mock_backend(content_type: &'static str, body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        // Drain the request head before responding.
                        let mut buf = [0u8; 1024];
                        let _ = socket.read(&mut buf).await;
                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            content_type,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}
