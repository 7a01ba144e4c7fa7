//! # Trigger Config Consensus
//!
//! Every DON node reports its trigger configs independently. The gateway only trusts a
//! config that more than `F` peers report identically.
//!
//! ## Algorithm Steps
//!
//! 1. **Freshness**: Skip peer snapshots older than `snapshot_retention`
//! 2. **Grouping**: For each trigger id, hash every peer's config canonically and group
//!    by hash
//! 3. **Winner**: Largest group wins; ties go to the lexicographically smallest hash
//! 4. **Threshold**: Accept the winner only with at least `F + 1` reports
//!
//! A trigger id without quorum keeps its previous consensus value. This is single-round
//! best-of-N hash voting, not multi-round agreement.
//!
//! # Module Organization
//!
//! - [`config`]: `ConsensusConfig`
//! - [`types`]: Result types (`ConsensusResult`, `ConfigGroup`, `ConsensusRound`)
//! - [`engine`]: `ConsensusEngine`, the entry point
//! - [`quorum`]: Stateless grouping and threshold logic

pub mod config;
pub mod engine;
pub mod quorum;
pub mod types;

#[cfg(test)]
mod tests;

pub use config::ConsensusConfig;
pub use engine::ConsensusEngine;
pub use types::{ConfigGroup, ConsensusResult, ConsensusRound};
