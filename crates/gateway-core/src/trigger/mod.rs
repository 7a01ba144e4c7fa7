//! Trigger configuration reported by DON nodes.
//!
//! Nodes push their full set of trigger configs through
//! `web_api_trigger_update_metadata`. Each entry is a base64 blob holding a
//! self-describing JSON map, which a [`ConfigValidator`] turns into a typed
//! [`TriggerConfig`]. The [`TriggerMetadataStore`] keeps the latest accepted snapshot per
//! peer; agreement across peers is computed by [`crate::consensus`].

pub mod config;
pub mod store;

pub use config::{ConfigValidator, TriggerConfig, TriggerConfigValidator, ValidationError};
pub use store::{MetadataError, PeerTriggerSnapshot, TriggerMetadataStore};
pub(crate) use store::{SharedTriggerState, TriggerState};
