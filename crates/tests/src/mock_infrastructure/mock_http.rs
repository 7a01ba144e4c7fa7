//! Scripted `HttpClient` for exercising outbound dispatch without sockets.

use async_trait::async_trait;
use bytes::Bytes;
use gateway_core::network::{HttpClient, HttpRequest, HttpResponse, NetworkError};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

/// Answers every call with the configured outcome after an optional delay.
#[derive(Debug)]
pub struct MockHttpClient {
    outcome: Mutex<Result<HttpResponse, NetworkError>>,
    delay: Mutex<Duration>,
    requests: Mutex<Vec<HttpRequest>>,
    completed: AtomicUsize,
}

impl Default for MockHttpClient {
    fn default() -> Self {
        Self::responding(200, "{}")
    }
}

impl MockHttpClient {
    #[must_use]
    pub fn responding(status_code: u16, body: &str) -> Self {
        let response = HttpResponse {
            status_code,
            headers: HashMap::from([("content-type".to_string(), "application/json".to_string())]),
            body: Bytes::copy_from_slice(body.as_bytes()),
        };
        Self {
            outcome: Mutex::new(Ok(response)),
            delay: Mutex::new(Duration::ZERO),
            requests: Mutex::new(Vec::new()),
            completed: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn failing(error: NetworkError) -> Self {
        let client = Self::default();
        *client.outcome.lock() = Err(error);
        client
    }

    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock() = delay;
        self
    }

    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Calls that ran to completion (not cut short by a deadline).
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, NetworkError> {
        self.requests.lock().push(request);

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.completed.fetch_add(1, Ordering::SeqCst);
        self.outcome.lock().clone()
    }
}
