use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use thiserror::Error;
use tracing::{debug, warn};

use super::config::{ConfigValidator, TriggerConfig, ValidationError};
use crate::consensus::ConsensusResult;

/// Latest set of trigger configs reported by one peer. Replaced wholesale on update.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerTriggerSnapshot {
    pub peer_id: String,
    pub last_updated_at: DateTime<Utc>,
    pub configs_by_trigger_id: BTreeMap<String, TriggerConfig>,
}

/// Peer snapshots and the consensus derived from them, guarded by one lock.
#[derive(Debug, Default)]
pub(crate) struct TriggerState {
    pub(crate) peers: HashMap<String, PeerTriggerSnapshot>,
    pub(crate) consensus: ConsensusResult,
}

pub(crate) type SharedTriggerState = Arc<Mutex<TriggerState>>;

#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum MetadataError {
    #[error("metadata payload must map trigger ids to base64 strings: {0}")]
    Payload(String),

    #[error("trigger {trigger_id}: invalid base64: {reason}")]
    Base64 { trigger_id: String, reason: String },

    #[error("trigger {trigger_id}: undecodable value: {reason}")]
    Value { trigger_id: String, reason: String },

    #[error("trigger {trigger_id}: {source}")]
    Validation {
        trigger_id: String,
        #[source]
        source: ValidationError,
    },
}

/// Per-peer trigger configuration reports.
///
/// Each update is all-or-nothing: one bad entry rejects the whole report and the peer's
/// previous snapshot stays in place.
pub struct TriggerMetadataStore {
    state: SharedTriggerState,
    validator: Arc<dyn ConfigValidator>,
}

impl TriggerMetadataStore {
    #[must_use]
    pub fn new(validator: Arc<dyn ConfigValidator>) -> Self {
        Self { state: Arc::new(Mutex::new(TriggerState::default())), validator }
    }

    pub(crate) fn shared_state(&self) -> SharedTriggerState {
        Arc::clone(&self.state)
    }

    /// Replaces `peer_id`'s snapshot with the configs in `raw_payload`.
    ///
    /// # Errors
    ///
    /// Returns a [`MetadataError`] when the payload or any entry fails to decode or
    /// validate. Nothing is stored in that case.
    pub fn update(&self, peer_id: &str, raw_payload: &str) -> Result<(), MetadataError> {
        self.update_at(peer_id, raw_payload, Utc::now())
    }

    /// [`update`](Self::update) with an explicit clock reading.
    ///
    /// # Errors
    ///
    /// Same as [`update`](Self::update).
    pub fn update_at(
        &self,
        peer_id: &str,
        raw_payload: &str,
        now: DateTime<Utc>,
    ) -> Result<(), MetadataError> {
        let configs = self.decode(raw_payload).inspect_err(|e| {
            warn!(peer_id = peer_id, error = %e, "rejected trigger metadata update");
        })?;

        debug!(peer_id = peer_id, triggers = configs.len(), "trigger metadata updated");

        let snapshot = PeerTriggerSnapshot {
            peer_id: peer_id.to_string(),
            last_updated_at: now,
            configs_by_trigger_id: configs,
        };
        self.state.lock().peers.insert(peer_id.to_string(), snapshot);
        Ok(())
    }

    /// Decodes and validates every entry without touching shared state.
    fn decode(&self, raw_payload: &str) -> Result<BTreeMap<String, TriggerConfig>, MetadataError> {
        let encoded: HashMap<String, String> =
            serde_json::from_str(raw_payload).map_err(|e| MetadataError::Payload(e.to_string()))?;

        let mut configs = BTreeMap::new();
        for (trigger_id, b64) in encoded {
            let bytes = STANDARD.decode(b64.as_bytes()).map_err(|e| MetadataError::Base64 {
                trigger_id: trigger_id.clone(),
                reason: e.to_string(),
            })?;
            let value: Value = serde_json::from_slice(&bytes).map_err(|e| {
                MetadataError::Value { trigger_id: trigger_id.clone(), reason: e.to_string() }
            })?;
            let config = self.validator.validate_config(&value).map_err(|source| {
                MetadataError::Validation { trigger_id: trigger_id.clone(), source }
            })?;
            configs.insert(trigger_id, config);
        }
        Ok(configs)
    }

    #[must_use]
    pub fn snapshot(&self, peer_id: &str) -> Option<PeerTriggerSnapshot> {
        self.state.lock().peers.get(peer_id).cloned()
    }

    /// Peer ids with a stored snapshot, sorted.
    #[must_use]
    pub fn peers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self.state.lock().peers.keys().cloned().collect();
        peers.sort_unstable();
        peers
    }

    /// Drops snapshots last updated more than `retention` before `now`.
    pub fn prune_older_than(&self, retention: std::time::Duration, now: DateTime<Utc>) -> usize {
        let Ok(retention) = ChronoDuration::from_std(retention) else {
            return 0;
        };
        let cutoff = now - retention;

        let mut state = self.state.lock();
        let before = state.peers.len();
        state.peers.retain(|_, snapshot| snapshot.last_updated_at >= cutoff);
        before - state.peers.len()
    }
}

impl std::fmt::Debug for TriggerMetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerMetadataStore")
            .field("peers", &self.state.lock().peers.len())
            .finish_non_exhaustive()
    }
}
