use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client, ClientBuilder, Method,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::NetworkError;

/// One outbound HTTP call, already decoded from a node's request payload.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
    pub timeout: Duration,
}

/// Response of an outbound call. Any status code counts as a completed execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

/// Performs outbound HTTP calls on behalf of DON nodes.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends `request`, honoring `request.timeout`.
    ///
    /// # Errors
    ///
    /// Returns a [`NetworkError`] when no HTTP response was obtained.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, NetworkError>;
}

/// Configuration for HTTP client concurrency and size limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Maximum number of concurrent outbound requests
    pub concurrent_limit: usize,
    /// Permit acquisition timeout in milliseconds
    pub permit_timeout_ms: u64,
    /// TCP connect timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Largest response body accepted, in bytes
    pub max_response_bytes: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            concurrent_limit: 256,
            permit_timeout_ms: 500,
            connect_timeout_ms: 5_000,
            max_response_bytes: 10 * 1024 * 1024,
        }
    }
}

/// reqwest-backed [`HttpClient`] with semaphore-based concurrency control.
///
/// Redirects are never followed and transport errors are reduced to a fixed set of
/// messages before they leave this type.
pub struct ReqwestHttpClient {
    client: Client,
    concurrent_limit: Arc<Semaphore>,
    config: HttpClientConfig,
}

/// RAII guard ensuring semaphore permits are always released.
struct PermitGuard {
    _permit: OwnedSemaphorePermit,
    semaphore: Arc<Semaphore>,
}

impl PermitGuard {
    fn new(permit: OwnedSemaphorePermit, semaphore: Arc<Semaphore>) -> Self {
        Self { _permit: permit, semaphore }
    }
}

impl Drop for PermitGuard {
    fn drop(&mut self) {
        tracing::trace!(
            available_permits = self.semaphore.available_permits(),
            "permit guard dropped"
        );
    }
}

impl ReqwestHttpClient {
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to build.
    pub fn new() -> Result<Self, NetworkError> {
        Self::with_config(HttpClientConfig::default())
    }

    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to build.
    pub fn with_config(config: HttpClientConfig) -> Result<Self, NetworkError> {
        let client = ClientBuilder::new()
            .pool_idle_timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("webapi-gateway/", env!("CARGO_PKG_VERSION")))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| {
                tracing::error!(error = %e, "failed to build http client");
                NetworkError::ClientBuild(e.to_string())
            })?;

        Ok(Self {
            client,
            concurrent_limit: Arc::new(Semaphore::new(config.concurrent_limit)),
            config,
        })
    }

    /// Sanitizes network errors to prevent information disclosure.
    fn sanitize_network_error(error: &reqwest::Error) -> NetworkError {
        if error.is_timeout() {
            return NetworkError::Timeout;
        }
        let message = if error.is_connect() {
            "connection refused or unreachable"
        } else if error.is_request() {
            "request failed"
        } else if error.is_body() {
            "response body error"
        } else if error.is_decode() {
            "response decode error"
        } else {
            "network error"
        };
        NetworkError::ConnectionFailed(message.to_string())
    }

    fn build_headers(headers: &HashMap<String, String>) -> Result<HeaderMap, NetworkError> {
        let mut map = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| NetworkError::InvalidRequest(format!("invalid header name: {name}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| NetworkError::InvalidRequest(format!("invalid value for {name}")))?;
            map.append(name, value);
        }
        Ok(map)
    }

    /// Flattens response headers; repeated names are joined with `", "`.
    fn flatten_headers(headers: &HeaderMap) -> HashMap<String, String> {
        let mut flat: HashMap<String, String> = HashMap::with_capacity(headers.len());
        for (name, value) in headers {
            let Ok(value) = value.to_str() else { continue };
            flat.entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }
        flat
    }

    async fn acquire_permit(&self) -> Result<PermitGuard, NetworkError> {
        let permit = tokio::time::timeout(
            Duration::from_millis(self.config.permit_timeout_ms),
            Arc::clone(&self.concurrent_limit).acquire_owned(),
        )
        .await
        .map_err(|_| {
            tracing::warn!(
                available_permits = self.concurrent_limit.available_permits(),
                "http client semaphore acquisition timeout"
            );
            NetworkError::ConcurrencyLimit
        })?
        .map_err(|_| NetworkError::ConcurrencyLimit)?;

        Ok(PermitGuard::new(permit, self.concurrent_limit.clone()))
    }

    #[cfg(test)]
    fn available_permits(&self) -> usize {
        self.concurrent_limit.available_permits()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, NetworkError> {
        let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| NetworkError::InvalidRequest(format!("method {}", request.method)))?;
        let url = reqwest::Url::parse(&request.url)
            .map_err(|_| NetworkError::InvalidRequest("malformed url".to_string()))?;
        let headers = Self::build_headers(&request.headers)?;

        let _permit = self.acquire_permit().await?;

        let mut response = self
            .client
            .request(method, url)
            .headers(headers)
            .body(request.body)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| Self::sanitize_network_error(&e))?;

        let status_code = response.status().as_u16();
        let headers = Self::flatten_headers(response.headers());

        let limit = self.config.max_response_bytes;
        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(NetworkError::BodyTooLarge(limit));
        }

        let mut body = BytesMut::new();
        while let Some(chunk) =
            response.chunk().await.map_err(|e| Self::sanitize_network_error(&e))?
        {
            if body.len() + chunk.len() > limit {
                return Err(NetworkError::BodyTooLarge(limit));
            }
            body.extend_from_slice(&chunk);
        }

        tracing::trace!(status_code, body_len = body.len(), "http request completed");

        Ok(HttpResponse { status_code, headers, body: body.freeze() })
    }
}
