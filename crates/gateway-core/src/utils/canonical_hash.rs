//! Content hashing for consensus voting.
//!
//! Two peers that report the same structured value must produce the same hash no matter
//! how their encoder ordered object keys, so values are fed to SHA-256 through a
//! canonical byte encoding instead of their serialized text.
//!
//! # Encoding
//!
//! Each JSON type is prefixed with a discriminant byte to prevent collisions:
//! - Null: `0`
//! - Bool: `1` + `0`/`1`
//! - Number: `2` + sub-tag (`0` i64, `1` u64, `2` f64) + 8 big-endian bytes
//! - String: `3` + u64 length + UTF-8 bytes
//! - Array: `4` + u64 length + each element
//! - Object: `5` + u64 length + (key, value) pairs sorted by key

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// Hex-encoded SHA-256 of a value's canonical encoding.
///
/// Ordering is lexicographic on the hex text, which consensus uses to break ties.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash(String);

impl ContentHash {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hashes a JSON value independently of object key order.
#[must_use]
pub fn canonical_hash(value: &Value) -> ContentHash {
    let mut hasher = Sha256::new();
    write_canonical(value, &mut hasher);
    ContentHash(hex::encode(hasher.finalize()))
}

/// Hashes any serializable value through its JSON form.
///
/// # Errors
///
/// Returns the serialization error if `value` cannot be represented as JSON.
pub fn canonical_hash_of<T: Serialize>(value: &T) -> Result<ContentHash, serde_json::Error> {
    Ok(canonical_hash(&serde_json::to_value(value)?))
}

fn write_len(len: usize, hasher: &mut Sha256) {
    hasher.update((len as u64).to_be_bytes());
}

fn write_canonical(value: &Value, hasher: &mut Sha256) {
    match value {
        Value::Null => hasher.update([0u8]),
        Value::Bool(b) => hasher.update([1u8, u8::from(*b)]),
        Value::Number(n) => {
            hasher.update([2u8]);
            if let Some(i) = n.as_i64() {
                hasher.update([0u8]);
                hasher.update(i.to_be_bytes());
            } else if let Some(u) = n.as_u64() {
                hasher.update([1u8]);
                hasher.update(u.to_be_bytes());
            } else if let Some(f) = n.as_f64() {
                hasher.update([2u8]);
                // -0.0 and 0.0 compare equal and must vote together.
                let normalized = f + 0.0;
                hasher.update(normalized.to_bits().to_be_bytes());
            }
        }
        Value::String(s) => {
            hasher.update([3u8]);
            write_len(s.len(), hasher);
            hasher.update(s.as_bytes());
        }
        Value::Array(arr) => {
            hasher.update([4u8]);
            write_len(arr.len(), hasher);
            for element in arr {
                write_canonical(element, hasher);
            }
        }
        Value::Object(obj) => {
            hasher.update([5u8]);
            write_len(obj.len(), hasher);

            let mut entries: Vec<(&String, &Value)> = obj.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));

            for (key, value) in entries {
                write_len(key.len(), hasher);
                hasher.update(key.as_bytes());
                write_canonical(value, hasher);
            }
        }
    }
}
