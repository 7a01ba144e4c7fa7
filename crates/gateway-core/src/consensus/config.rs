//! Consensus configuration.

use std::time::Duration;

/// Parameters of the trigger config vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsensusConfig {
    /// Maximum number of faulty peers tolerated. A value needs `f + 1` identical reports.
    pub f: u32,
    /// Peer snapshots older than this do not vote.
    pub snapshot_retention: Duration,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self { f: 1, snapshot_retention: Duration::from_secs(300) }
    }
}

impl ConsensusConfig {
    /// Smallest group size that is accepted as consensus.
    #[must_use]
    pub fn min_agreement(&self) -> usize {
        self.f as usize + 1
    }
}
