//! Tests for the consensus module.
//!
//! - `engine_tests`: `ConsensusEngine` rounds over a real `TriggerMetadataStore`
//! - Unit tests for grouping are in `quorum`
