use thiserror::Error;

/// Errors that can occur while performing an outbound HTTP call.
///
/// Messages are safe to forward to the requesting node: they never contain the target
/// URL, resolved addresses or raw transport errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum NetworkError {
    /// Request exceeded its deadline.
    #[error("request timeout")]
    Timeout,

    /// Failed to reach the target or the transport broke mid-request.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The request could not be built (bad method, header or URL).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// All request slots were busy for longer than the permit timeout.
    #[error("concurrency limit reached")]
    ConcurrencyLimit,

    /// The response body exceeded the configured maximum.
    #[error("response body exceeds {0} bytes")]
    BodyTooLarge(usize),

    /// The underlying client could not be constructed.
    #[error("http client build failed: {0}")]
    ClientBuild(String),
}

impl NetworkError {
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Returns a static string representation for log fields.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ConnectionFailed(_) => "connection_failed",
            Self::InvalidRequest(_) => "invalid_request",
            Self::ConcurrencyLimit => "concurrency_limit",
            Self::BodyTooLarge(_) => "body_too_large",
            Self::ClientBuild(_) => "client_build",
        }
    }
}
