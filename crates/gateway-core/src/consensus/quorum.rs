//! Hash voting over peer-reported trigger configs.
//!
//! All functions are stateless and operate on borrowed peer reports.
//!
//! # Key Functions
//!
//! - [`group_configs`]: Groups reports by canonical content hash
//! - [`find_consensus`]: Picks the winning group and applies the `f + 1` threshold

use super::types::ConfigGroup;
use crate::{
    trigger::TriggerConfig,
    utils::{canonical_hash_of, ContentHash},
};
use std::collections::HashMap;
use tracing::warn;

/// Groups `(peer_id, config)` reports by content hash.
///
/// Groups are ordered by count descending, then by hash ascending, so the first group
/// is the winner under the smallest-hash tie-break.
#[must_use]
pub fn group_configs(reports: &[(&str, &TriggerConfig)]) -> Vec<ConfigGroup> {
    let mut groups: HashMap<ContentHash, ConfigGroup> = HashMap::with_capacity(reports.len());

    for (peer_id, config) in reports {
        let hash = match canonical_hash_of(*config) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(peer_id = peer_id, error = %e, "trigger config not hashable, skipping vote");
                continue;
            }
        };

        let group = groups.entry(hash.clone()).or_insert_with(|| ConfigGroup {
            hash,
            peers: Vec::new(),
            count: 0,
            config: (*config).clone(),
        });
        group.peers.push((*peer_id).to_string());
        group.count += 1;
    }

    let mut sorted: Vec<ConfigGroup> = groups.into_values().collect();
    for group in &mut sorted {
        group.peers.sort_unstable();
    }
    sorted.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.hash.cmp(&b.hash)));
    sorted
}

/// Returns the winning group if it reaches `min_agreement` reports.
///
/// # Errors
///
/// Returns the best count seen when no group qualifies (0 for no reports).
pub fn find_consensus(
    reports: &[(&str, &TriggerConfig)],
    min_agreement: usize,
) -> Result<ConfigGroup, usize> {
    let groups = group_configs(reports);
    match groups.into_iter().next() {
        Some(best) if best.count >= min_agreement => Ok(best),
        Some(best) => Err(best.count),
        None => Err(0),
    }
}
