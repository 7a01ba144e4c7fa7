//! Connection to the Decentralized Oracle Network.
//!
//! The gateway never manages node connections itself; it hands messages to a [`Don`]
//! implementation by node address. Membership is static configuration
//! ([`DonConfig`]) so broadcast fan-out does not depend on connection state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Message;

/// One DON node as known to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonMember {
    pub name: String,
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DonConfig {
    pub don_id: String,
    pub members: Vec<DonMember>,
}

impl DonConfig {
    /// Node addresses in configuration order.
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.address.as_str())
    }

    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.don_id.is_empty() {
            return Err("don.don_id must not be empty".to_string());
        }
        if self.members.is_empty() {
            return Err("don.members must list at least one node".to_string());
        }
        let mut seen = std::collections::HashSet::new();
        for member in &self.members {
            if member.address.is_empty() {
                return Err(format!("don member '{}' has an empty address", member.name));
            }
            if !seen.insert(member.address.as_str()) {
                return Err(format!("duplicate don member address: {}", member.address));
            }
        }
        Ok(())
    }
}

/// Errors returned by a [`Don`] when a message cannot be handed to a node.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DonError {
    #[error("node not connected: {0}")]
    NodeNotConnected(String),

    #[error("send to {node} failed: {reason}")]
    SendFailed { node: String, reason: String },

    #[error("send to {0} timed out")]
    Timeout(String),

    #[error("message encoding failed: {0}")]
    Encode(String),
}

/// Transport to DON nodes.
#[async_trait]
pub trait Don: Send + Sync {
    /// Delivers `msg` to the node at `node_addr`.
    ///
    /// # Errors
    ///
    /// Returns a [`DonError`] when the node is unknown or the send fails.
    async fn send_to_node(&self, node_addr: &str, msg: &Message) -> Result<(), DonError>;
}
