use parking_lot::RwLock;
use std::{sync::Arc, time::Duration};
use tokio::time::{timeout_at, Instant};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

use super::GatewayError;
use crate::{
    don::Don,
    middleware::RateLimiter,
    network::{HttpClient, HttpRequest, NetworkError},
    types::{Message, OutboundRequestPayload, OutboundResponsePayload},
};

/// Timeouts applied to one brokered call.
#[derive(Debug, Clone, Copy)]
pub struct OutboundTimeouts {
    pub default: Duration,
    pub max: Duration,
    pub reply: Duration,
}

impl OutboundTimeouts {
    /// Deadline for a node-requested timeout: `<= 0` takes the default, larger values
    /// are clamped to `max`.
    #[must_use]
    pub fn call_timeout(&self, requested_ms: i64) -> Duration {
        u64::try_from(requested_ms)
            .ok()
            .filter(|ms| *ms > 0)
            .map_or(self.default, Duration::from_millis)
            .min(self.max)
    }
}

/// Executes HTTP calls requested by DON nodes and returns the result to the node.
///
/// Calls run on tasks owned by an internal [`TaskTracker`], not on the future that
/// delivered the request, so a dropped caller never cancels a call in flight.
pub struct OutboundDispatcher {
    limiter: Arc<RateLimiter>,
    http_client: Arc<dyn HttpClient>,
    don: Arc<dyn Don>,
    timeouts: OutboundTimeouts,
    tracker: TaskTracker,
    /// Held shared from the closed check through the spawn, exclusively by `close`.
    admission: RwLock<()>,
}

impl OutboundDispatcher {
    #[must_use]
    pub fn new(
        limiter: Arc<RateLimiter>,
        http_client: Arc<dyn HttpClient>,
        don: Arc<dyn Don>,
        timeouts: OutboundTimeouts,
    ) -> Self {
        Self {
            limiter,
            http_client,
            don,
            timeouts,
            tracker: TaskTracker::new(),
            admission: RwLock::new(()),
        }
    }

    /// Admits, decodes and spawns the call described by `request`. Returns as soon as
    /// the call is scheduled.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::ShuttingDown`] once [`close`](Self::close) has been called
    /// - [`GatewayError::RateLimited`] when `node_addr` is over its budget
    /// - [`GatewayError::InvalidPayload`] when the payload is not an outbound request
    pub fn run(&self, request: &Message, node_addr: &str) -> Result<(), GatewayError> {
        let _admission = self.admission.read();
        if self.tracker.is_closed() {
            return Err(GatewayError::ShuttingDown);
        }

        if !self.limiter.allow(node_addr) {
            warn!(node_addr = node_addr, message_id = request.id(), "outbound rate limit exceeded");
            return Err(GatewayError::RateLimited(node_addr.to_string()));
        }

        let payload: OutboundRequestPayload = request
            .decode_payload()
            .map_err(|e| GatewayError::InvalidPayload(e.to_string()))?;

        let http_request = HttpRequest {
            method: payload.method,
            url: payload.url,
            headers: payload.headers,
            body: payload.body,
            timeout: self.timeouts.call_timeout(payload.timeout_ms),
        };

        debug!(
            message_id = request.id(),
            node_addr = node_addr,
            method = %http_request.method,
            url = %http_request.url,
            timeout_ms = http_request.timeout.as_millis(),
            "dispatching outbound call"
        );

        self.tracker.spawn(execute(
            Arc::clone(&self.http_client),
            Arc::clone(&self.don),
            request.clone(),
            node_addr.to_string(),
            http_request,
            self.timeouts.reply,
        ));
        Ok(())
    }

    /// Stops accepting new calls. Calls already spawned keep running.
    ///
    /// Blocks until every `run` that passed the closed check has spawned its call, so a
    /// following [`wait`](Self::wait) covers all admitted calls.
    pub fn close(&self) {
        let _admission = self.admission.write();
        self.tracker.close();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tracker.is_closed()
    }

    /// Waits for every spawned call to finish. Only returns after [`close`](Self::close).
    pub async fn wait(&self) {
        self.tracker.wait().await;
    }

    /// Calls currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    #[must_use]
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }
}

impl std::fmt::Debug for OutboundDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundDispatcher")
            .field("timeouts", &self.timeouts)
            .field("in_flight", &self.tracker.len())
            .field("closed", &self.tracker.is_closed())
            .finish_non_exhaustive()
    }
}

async fn execute(
    http_client: Arc<dyn HttpClient>,
    don: Arc<dyn Don>,
    request: Message,
    node_addr: String,
    http_request: HttpRequest,
    reply_timeout: Duration,
) {
    let deadline = Instant::now() + http_request.timeout;
    let url = http_request.url.clone();

    let outcome = match timeout_at(deadline, http_client.send(http_request)).await {
        Ok(result) => result,
        Err(_) => Err(NetworkError::Timeout),
    };

    let response = match outcome {
        Ok(resp) => {
            debug!(
                message_id = request.id(),
                status_code = resp.status_code,
                "outbound call completed"
            );
            OutboundResponsePayload::success(resp.status_code, resp.headers, resp.body)
        }
        Err(e) => {
            if e.is_timeout() {
                warn!(message_id = request.id(), url = %url, "outbound call hit its deadline");
            } else {
                error!(
                    message_id = request.id(),
                    url = %url,
                    error_kind = e.as_str(),
                    error = %e,
                    "outbound call failed"
                );
            }
            OutboundResponsePayload::failure(e.to_string())
        }
    };

    let reply = match request.reply_with(&response) {
        Ok(reply) => reply,
        Err(e) => {
            error!(message_id = request.id(), error = %e, "failed to encode outbound reply");
            return;
        }
    };

    match timeout_at(Instant::now() + reply_timeout, don.send_to_node(&node_addr, &reply)).await
    {
        Ok(Ok(())) => {
            debug!(message_id = reply.id(), node_addr = %node_addr, "outbound reply sent");
        }
        Ok(Err(e)) => {
            error!(
                message_id = reply.id(),
                node_addr = %node_addr,
                error = %e,
                "failed to send outbound reply"
            );
        }
        Err(_) => {
            error!(message_id = reply.id(), node_addr = %node_addr, "outbound reply timed out");
        }
    }
}
