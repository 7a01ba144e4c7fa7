//! Consensus result types.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::{trigger::TriggerConfig, utils::ContentHash};

/// Agreed trigger configs. Mutated only by the consensus engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsensusResult {
    /// Time of the last round that accepted at least one trigger id.
    pub last_updated_at: Option<DateTime<Utc>>,
    pub configs_by_trigger_id: BTreeMap<String, TriggerConfig>,
}

/// Peers that reported an identical config for one trigger id.
#[derive(Debug, Clone)]
pub struct ConfigGroup {
    /// Canonical content hash shared by every config in the group.
    pub hash: ContentHash,
    /// Peer ids in the group, sorted.
    pub peers: Vec<String>,
    pub count: usize,
    pub config: TriggerConfig,
}

/// Outcome of one `recompute` pass, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsensusRound {
    /// Trigger ids whose consensus value was set this round.
    pub accepted: Vec<String>,
    /// Trigger ids whose best group fell short of `f + 1`; previous values kept.
    pub no_quorum: Vec<String>,
    /// Peers whose snapshots took part in the vote.
    pub participating_peers: usize,
    /// Peers skipped because their snapshot is older than the retention window.
    pub expired_peers: usize,
}

impl ConsensusRound {
    #[must_use]
    pub fn is_accepted(&self, trigger_id: &str) -> bool {
        self.accepted.iter().any(|id| id == trigger_id)
    }
}
