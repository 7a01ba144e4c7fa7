//! Consensus engine over peer trigger snapshots.
//!
//! The engine shares one lock with the [`TriggerMetadataStore`] it was built from, so a
//! round always sees a consistent set of snapshots. Hashing happens under that lock;
//! rounds are run on a slow cadence and never per request.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::BTreeSet;
use tracing::{debug, info};

use super::{
    config::ConsensusConfig,
    quorum,
    types::{ConsensusResult, ConsensusRound},
};
use crate::trigger::{SharedTriggerState, TriggerConfig, TriggerMetadataStore};

pub struct ConsensusEngine {
    state: SharedTriggerState,
    config: ConsensusConfig,
}

impl ConsensusEngine {
    #[must_use]
    pub fn new(store: &TriggerMetadataStore, config: ConsensusConfig) -> Self {
        Self { state: store.shared_state(), config }
    }

    #[must_use]
    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    /// Runs one voting round against the current snapshots.
    pub fn recompute(&self) -> ConsensusRound {
        self.recompute_at(Utc::now())
    }

    /// [`recompute`](Self::recompute) with an explicit clock reading.
    ///
    /// Trigger ids that fall short of `f + 1` identical reports keep their previous
    /// value; the round continues with the next trigger id.
    pub fn recompute_at(&self, now: DateTime<Utc>) -> ConsensusRound {
        let cutoff = ChronoDuration::from_std(self.config.snapshot_retention)
            .ok()
            .and_then(|retention| now.checked_sub_signed(retention));
        let min_agreement = self.config.min_agreement();

        let mut state = self.state.lock();
        let mut round = ConsensusRound::default();

        let fresh: Vec<_> = state
            .peers
            .values()
            .filter(|snapshot| cutoff.is_none_or(|cutoff| snapshot.last_updated_at >= cutoff))
            .collect();
        round.participating_peers = fresh.len();
        round.expired_peers = state.peers.len() - fresh.len();

        let trigger_ids: BTreeSet<&String> =
            fresh.iter().flat_map(|snapshot| snapshot.configs_by_trigger_id.keys()).collect();

        let mut winners: Vec<(String, TriggerConfig)> = Vec::new();
        for trigger_id in trigger_ids {
            let reports: Vec<(&str, &TriggerConfig)> = fresh
                .iter()
                .filter_map(|snapshot| {
                    snapshot
                        .configs_by_trigger_id
                        .get(trigger_id)
                        .map(|config| (snapshot.peer_id.as_str(), config))
                })
                .collect();

            match quorum::find_consensus(&reports, min_agreement) {
                Ok(group) => {
                    debug!(
                        trigger_id = %trigger_id,
                        agreement = group.count,
                        reports = reports.len(),
                        hash = %group.hash,
                        "trigger config consensus reached"
                    );
                    round.accepted.push(trigger_id.clone());
                    winners.push((trigger_id.clone(), group.config));
                }
                Err(best_count) => {
                    debug!(
                        trigger_id = %trigger_id,
                        best_count,
                        required = min_agreement,
                        "no quorum for trigger config, keeping previous value"
                    );
                    round.no_quorum.push(trigger_id.clone());
                }
            }
        }

        if !winners.is_empty() {
            state.consensus.configs_by_trigger_id.extend(winners);
            state.consensus.last_updated_at = Some(now);
        }
        drop(state);

        if round.expired_peers > 0 {
            info!(
                expired_peers = round.expired_peers,
                participating_peers = round.participating_peers,
                "excluded stale peer snapshots from consensus"
            );
        }

        round
    }

    /// Copy of the current consensus result.
    #[must_use]
    pub fn consensus_snapshot(&self) -> ConsensusResult {
        self.state.lock().consensus.clone()
    }

    #[must_use]
    pub fn consensus_config(&self, trigger_id: &str) -> Option<TriggerConfig> {
        self.state.lock().consensus.configs_by_trigger_id.get(trigger_id).cloned()
    }
}

impl std::fmt::Debug for ConsensusEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsensusEngine").field("config", &self.config).finish_non_exhaustive()
    }
}
