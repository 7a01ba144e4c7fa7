use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::middleware::RateLimiterConfig;

/// Typed trigger configuration as reported by a node for one trigger id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerConfig {
    pub allowed_senders: Vec<String>,
    pub allowed_topics: Vec<String>,
    pub rate_limiter: RateLimiterConfig,
    pub required_params: Vec<String>,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("trigger config must be a map, got {0}")]
    NotAMap(&'static str),

    #[error("malformed trigger config: {0}")]
    Malformed(String),

    #[error("invalid rate limiter: {0}")]
    RateLimiter(#[from] crate::middleware::RateLimiterError),

    #[error("{field} contains an empty entry")]
    EmptyEntry { field: &'static str },
}

/// Turns a node-reported structured value into a [`TriggerConfig`].
pub trait ConfigValidator: Send + Sync {
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when `value` is not a valid trigger config.
    fn validate_config(&self, value: &Value) -> Result<TriggerConfig, ValidationError>;
}

/// Default validator: decodes the value and checks that every list entry and rate limit
/// is usable.
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerConfigValidator;

impl ConfigValidator for TriggerConfigValidator {
    fn validate_config(&self, value: &Value) -> Result<TriggerConfig, ValidationError> {
        if !value.is_object() {
            return Err(ValidationError::NotAMap(json_kind(value)));
        }

        let config = TriggerConfig::deserialize(value)
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;

        config.rate_limiter.validate()?;

        for (field, entries) in [
            ("allowedSenders", &config.allowed_senders),
            ("allowedTopics", &config.allowed_topics),
            ("requiredParams", &config.required_params),
        ] {
            if entries.iter().any(String::is_empty) {
                return Err(ValidationError::EmptyEntry { field });
            }
        }

        Ok(config)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}
