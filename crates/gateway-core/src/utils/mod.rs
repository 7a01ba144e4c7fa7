//! Shared helpers.
//!
//! ## Canonical Hashing (`canonical_hash`)
//! - SHA-256 over a key-order-independent encoding of JSON values
//! - Used by trigger config consensus to group identical peer reports

pub mod canonical_hash;

pub use canonical_hash::{canonical_hash, canonical_hash_of, ContentHash};
