use std::{sync::Arc, time::Duration};
use tokio::{
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::CallbackTable;
use crate::{consensus::ConsensusEngine, middleware::RateLimiter};

/// Periodic upkeep shared by the router's components.
pub(crate) struct Maintenance {
    pub(crate) consensus: Arc<ConsensusEngine>,
    pub(crate) callbacks: Arc<CallbackTable>,
    pub(crate) limiter: Arc<RateLimiter>,
    pub(crate) interval: Duration,
    pub(crate) callback_ttl: Duration,
}

impl Maintenance {
    /// One pass: recompute consensus, expire old callbacks, drop idle limiter buckets.
    pub(crate) fn run_once(&self) {
        let round = self.consensus.recompute();
        let expired = self.callbacks.expire_older_than(self.callback_ttl);
        let evicted = self.limiter.evict_idle(self.callback_ttl);

        debug!(
            accepted = round.accepted.len(),
            no_quorum = round.no_quorum.len(),
            expired_callbacks = expired,
            evicted_buckets = evicted,
            "maintenance pass complete"
        );
    }

    /// Runs [`run_once`](Self::run_once) every `interval` until `shutdown` is cancelled.
    /// The first pass runs immediately.
    pub(crate) fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = shutdown.cancelled() => {
                        info!("gateway maintenance shutting down");
                        break;
                    }
                    _ = ticker.tick() => self.run_once(),
                }
            }
        })
    }
}
