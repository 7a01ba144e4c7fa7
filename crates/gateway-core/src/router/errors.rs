use std::fmt;
use thiserror::Error;

use crate::{don::DonError, middleware::RateLimiterError, trigger::MetadataError};

/// Errors returned to whoever delivered a message to the router.
///
/// Caller-side rejections (parse, staleness, wrong method) are not errors here: they are
/// delivered through the caller's callback instead.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    /// The node exceeded its outbound call budget.
    #[error("rate limit exceeded for node {0}")]
    RateLimited(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// `close` has started; no new outbound work is accepted.
    #[error("handler is shutting down")]
    ShuttingDown,

    #[error(transparent)]
    Broadcast(#[from] BroadcastError),

    #[error("metadata update rejected: {0}")]
    Metadata(#[from] MetadataError),

    #[error("invalid handler config: {0}")]
    Config(String),
}

impl From<RateLimiterError> for GatewayError {
    fn from(e: RateLimiterError) -> Self {
        Self::Config(e.to_string())
    }
}

/// Per-node failures of one broadcast. Nodes not listed received the message.
#[derive(Debug, Default)]
pub struct BroadcastError {
    pub failures: Vec<(String, DonError)>,
    pub attempted: usize,
}

impl BroadcastError {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Node addresses that did not receive the message.
    pub fn failed_nodes(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().map(|(node, _)| node.as_str())
    }
}

impl fmt::Display for BroadcastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "broadcast failed for {} of {} nodes", self.failures.len(), self.attempted)?;
        for (i, (node, err)) in self.failures.iter().enumerate() {
            f.write_str(if i == 0 { ": " } else { "; " })?;
            write!(f, "{node}: {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BroadcastError {}
