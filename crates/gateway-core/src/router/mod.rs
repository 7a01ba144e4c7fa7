//! Message routing between callers and DON nodes.
//!
//! ```text
//!  caller ──handle_user_message──► CallbackTable.register
//!                                        │
//!                                        ├─ parse / stale / method error ──► caller sink
//!                                        └─ broadcast ──► every DON member
//!
//!  node ──handle_node_message──┬─ web_api_trigger ──► CallbackTable (first wins)
//!                              ├─ web_api_target,
//!                              │  compute_action ───► OutboundDispatcher ─► node
//!                              └─ ..._update_metadata ► TriggerMetadataStore
//!
//!  maintenance (start .. close): ConsensusEngine.recompute, callback expiry,
//!                                idle rate limiter eviction
//! ```

pub mod callbacks;
pub mod errors;
mod maintenance;
pub mod outbound;


pub use callbacks::{CallbackSink, CallbackTable, Registration};
pub use errors::{BroadcastError, GatewayError};
pub use outbound::{OutboundDispatcher, OutboundTimeouts};

use chrono::Utc;
use futures_util::future::join_all;
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::HandlerConfig,
    consensus::ConsensusEngine,
    don::{Don, DonConfig},
    middleware::RateLimiter,
    network::HttpClient,
    trigger::{ConfigValidator, TriggerMetadataStore},
    types::{
        ErrorCode, Message, TriggerRequestPayload, UserCallbackPayload, METHOD_COMPUTE_ACTION,
        METHOD_WEB_API_TARGET, METHOD_WEB_API_TRIGGER, METHOD_WEB_API_TRIGGER_UPDATE_METADATA,
    },
};
use maintenance::Maintenance;

/// Gateway handler for one DON.
///
/// Owns the caller callback table and the outbound task set. The metadata store and
/// consensus engine share one lock over peer snapshots and the consensus result.
pub struct Router {
    config: HandlerConfig,
    don_config: DonConfig,
    don: Arc<dyn Don>,
    callbacks: Arc<CallbackTable>,
    metadata: Arc<TriggerMetadataStore>,
    consensus: Arc<ConsensusEngine>,
    outbound: OutboundDispatcher,
    shutdown: CancellationToken,
    maintenance_task: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
    closed: AtomicBool,
}

impl Router {
    /// Builds a router from validated configuration and its collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] when either config fails validation.
    pub fn new(
        config: HandlerConfig,
        don_config: DonConfig,
        don: Arc<dyn Don>,
        http_client: Arc<dyn HttpClient>,
        validator: Arc<dyn ConfigValidator>,
    ) -> Result<Self, GatewayError> {
        config.validate().map_err(GatewayError::Config)?;
        don_config.validate().map_err(GatewayError::Config)?;

        let limiter = Arc::new(RateLimiter::with_max_tracked_senders(
            config.node_rate_limiter,
            config.max_tracked_senders,
        )?);
        let metadata = TriggerMetadataStore::new(validator);
        let consensus = ConsensusEngine::new(&metadata, config.consensus_config());
        let outbound = OutboundDispatcher::new(
            limiter,
            http_client,
            Arc::clone(&don),
            config.outbound_timeouts(),
        );

        Ok(Self {
            config,
            don_config,
            don,
            callbacks: Arc::new(CallbackTable::new()),
            metadata: Arc::new(metadata),
            consensus: Arc::new(consensus),
            outbound,
            shutdown: CancellationToken::new(),
            maintenance_task: Mutex::new(None),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    /// Handles a caller request: validates it and fans it out to every DON member.
    ///
    /// The caller's `sink` receives exactly one terminal outcome: a parse, staleness or
    /// method error from here, the first node reply, or `RequestTimeout` on expiry.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Broadcast`] listing the members the request could not be
    /// sent to. Members not listed received it.
    pub async fn handle_user_message(
        &self,
        msg: Message,
        sink: CallbackSink,
    ) -> Result<(), GatewayError> {
        let registration = self.callbacks.register(msg.id(), sink);

        let payload = match msg.decode_payload::<TriggerRequestPayload>() {
            Ok(payload) if payload.timestamp != 0 => payload,
            Ok(_) => {
                let code = ErrorCode::UserMessageParseError;
                self.reject(msg, registration, code, "missing timestamp");
                return Ok(());
            }
            Err(e) => {
                let text = format!("error decoding payload: {e}");
                self.reject(msg, registration, ErrorCode::UserMessageParseError, text);
                return Ok(());
            }
        };

        if self.is_stale(payload.timestamp, Utc::now().timestamp()) {
            self.reject(msg, registration, ErrorCode::HandlerError, "stale message");
            return Ok(());
        }

        if msg.method() != METHOD_WEB_API_TRIGGER {
            let text = format!("invalid method: {}", msg.method());
            self.reject(msg, registration, ErrorCode::HandlerError, text);
            return Ok(());
        }

        debug!(
            message_id = msg.id(),
            trigger_id = %payload.trigger_id,
            members = self.don_config.members.len(),
            "broadcasting trigger request"
        );
        self.broadcast(&msg).await
    }

    /// Handles a message from DON node `node_addr`.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::UnsupportedMethod`] for methods nodes may not send
    /// - [`GatewayError::RateLimited`], [`GatewayError::InvalidPayload`] or
    ///   [`GatewayError::ShuttingDown`] from outbound dispatch
    /// - [`GatewayError::Metadata`] when a metadata update is rejected
    pub fn handle_node_message(&self, msg: Message, node_addr: &str) -> Result<(), GatewayError> {
        let method = msg.method().to_string();
        match method.as_str() {
            METHOD_WEB_API_TRIGGER => {
                let id = msg.id().to_string();
                if self.callbacks.resolve_and_deliver(&id, UserCallbackPayload::reply(msg)) {
                    debug!(message_id = %id, node_addr = node_addr, "delivered node response");
                } else {
                    debug!(message_id = %id, node_addr = node_addr, "ignored late response");
                }
                Ok(())
            }
            METHOD_WEB_API_TARGET | METHOD_COMPUTE_ACTION => self.outbound.run(&msg, node_addr),
            METHOD_WEB_API_TRIGGER_UPDATE_METADATA => {
                self.metadata.update(node_addr, msg.payload_str())?;
                Ok(())
            }
            other => {
                warn!(node_addr = node_addr, method = other, "unsupported node method");
                Err(GatewayError::UnsupportedMethod(other.to_string()))
            }
        }
    }

    /// Starts background maintenance. Idempotent; a closed router stays closed.
    pub fn start(&self) {
        if self.closed.load(Ordering::SeqCst) {
            warn!("router already closed, not starting maintenance");
            return;
        }
        if self.started.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            return;
        }

        let maintenance = Maintenance {
            consensus: Arc::clone(&self.consensus),
            callbacks: Arc::clone(&self.callbacks),
            limiter: Arc::clone(self.outbound.limiter()),
            interval: self.config.consensus_interval(),
            callback_ttl: self.config.callback_ttl(),
        };
        *self.maintenance_task.lock() = Some(maintenance.spawn(self.shutdown.child_token()));
        info!(don_id = %self.don_config.don_id, "gateway router started");
    }

    /// Stops accepting outbound work, stops maintenance, and waits for every outbound
    /// call in flight to finish. Idempotent; every caller returns only after the drain.
    pub async fn close(&self) {
        if self.closed.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            debug!("router close already initiated, waiting for outbound drain");
            self.outbound.wait().await;
            return;
        }

        info!(in_flight = self.outbound.in_flight(), "closing gateway router");
        self.outbound.close();
        self.shutdown.cancel();

        let task = self.maintenance_task.lock().take();
        if let Some(task) = task {
            match task.await {
                Ok(()) => debug!("maintenance task completed"),
                Err(e) if e.is_cancelled() => debug!("maintenance task cancelled"),
                Err(e) => error!(error = %e, "maintenance task failed"),
            }
        }

        self.outbound.wait().await;
        info!("gateway router closed");
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    #[must_use]
    pub fn don_config(&self) -> &DonConfig {
        &self.don_config
    }

    #[must_use]
    pub fn callbacks(&self) -> &Arc<CallbackTable> {
        &self.callbacks
    }

    #[must_use]
    pub fn metadata_store(&self) -> &Arc<TriggerMetadataStore> {
        &self.metadata
    }

    #[must_use]
    pub fn consensus(&self) -> &Arc<ConsensusEngine> {
        &self.consensus
    }

    #[must_use]
    pub fn outbound(&self) -> &OutboundDispatcher {
        &self.outbound
    }

    /// A request timestamped exactly `max_allowed_message_age_sec` ago is still fresh.
    fn is_stale(&self, timestamp: i64, now: i64) -> bool {
        let max_age = i64::try_from(self.config.max_allowed_message_age_sec).unwrap_or(i64::MAX);
        now.saturating_sub(timestamp) > max_age
    }

    /// Delivers a terminal error to this call's own registration. A newer registration
    /// under the same id is left alone.
    fn reject(
        &self,
        msg: Message,
        registration: Registration,
        code: ErrorCode,
        text: impl Into<String>,
    ) {
        let text = text.into();
        warn!(
            message_id = msg.id(),
            err_code = code.as_str(),
            error = %text,
            "rejected caller request"
        );
        let id = msg.id().to_string();
        let payload = UserCallbackPayload::error(msg, code, text);
        self.callbacks.resolve_registration(&id, registration, payload);
    }

    async fn broadcast(&self, msg: &Message) -> Result<(), GatewayError> {
        let sends = self.don_config.addresses().map(|addr| async move {
            (addr, self.don.send_to_node(addr, msg).await)
        });
        let results = join_all(sends).await;

        let attempted = results.len();
        let failures: Vec<_> = results
            .into_iter()
            .filter_map(|(addr, result)| result.err().map(|e| (addr.to_string(), e)))
            .collect();

        if failures.is_empty() {
            return Ok(());
        }

        let err = BroadcastError { failures, attempted };
        warn!(message_id = msg.id(), error = %err, "broadcast partially failed");
        Err(err.into())
    }
}

impl Drop for Router {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("don_id", &self.don_config.don_id)
            .field("pending_callbacks", &self.callbacks.len())
            .field("outbound", &self.outbound)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

const _: () = {
    const fn assert_send<T: Send>() {}
    const fn assert_sync<T: Sync>() {}
    let _ = assert_send::<Router>;
    let _ = assert_sync::<Router>;
};
