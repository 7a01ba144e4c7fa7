//! Gateway configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: `Default` implementations and `set_default` calls
//! 2. **Config file**: TOML file named by the `GATEWAY_CONFIG` env var
//! 3. **Environment variables**: `GATEWAY__*` env vars (`__` separates sections)
//!
//! # Configuration Sections
//!
//! - [`HandlerConfig`]: consensus `F`, node rate limits, message age, timeouts
//! - [`DonConfig`]: DON id and member nodes
//! - [`HttpClientConfig`]: outbound HTTP concurrency and size limits
//! - [`LoggingConfig`]: log level and format
//!
//! File and env keys are snake_case. The handler section also accepts the camelCase
//! names used by the handler JSON blob (`maxAllowedMessageAgeSec`, `nodeRateLimiter`, ...),
//! see [`HandlerConfig::from_json`].
//!
//! # Example
//!
//! ```toml
//! [handler]
//! f = 1
//! max_allowed_message_age_sec = 300
//!
//! [handler.node_rate_limiter]
//! global_rps = 100.0
//! global_burst = 100
//! per_sender_rps = 10.0
//! per_sender_burst = 10
//!
//! [don]
//! don_id = "workflow_don_1"
//!
//! [[don.members]]
//! name = "node-1"
//! address = "0x0001"
//! ```

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

use crate::{
    consensus::ConsensusConfig, don::DonConfig, middleware::RateLimiterConfig,
    network::HttpClientConfig, router::OutboundTimeouts,
};

/// Behaviour of the web API handler itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    /// Maximum number of faulty DON nodes. Consensus needs `f + 1` matching reports.
    #[serde(alias = "F")]
    pub f: u32,

    /// Limits for outbound HTTP calls requested by nodes.
    #[serde(alias = "nodeRateLimiter")]
    pub node_rate_limiter: RateLimiterConfig,

    /// Caller requests whose timestamp is older than this are rejected as stale.
    #[serde(alias = "maxAllowedMessageAgeSec")]
    pub max_allowed_message_age_sec: u64,

    /// Outbound call deadline when the node sends `timeoutMs <= 0`.
    #[serde(alias = "defaultTimeoutMs")]
    pub default_timeout_ms: u64,

    /// Upper bound applied to any node-requested outbound deadline.
    #[serde(alias = "maxTimeoutMs")]
    pub max_timeout_ms: u64,

    /// Deadline for sending an outbound result back to the node.
    #[serde(alias = "replyTimeoutMs")]
    pub reply_timeout_ms: u64,

    /// Pending caller callbacks older than this receive `RequestTimeout`.
    #[serde(alias = "callbackTtlMs")]
    pub callback_ttl_ms: u64,

    /// Cadence of the maintenance loop (consensus, callback expiry, limiter eviction).
    #[serde(alias = "consensusIntervalMs")]
    pub consensus_interval_ms: u64,

    /// Peer trigger snapshots older than this do not vote.
    #[serde(alias = "snapshotRetentionSec")]
    pub snapshot_retention_sec: u64,

    /// Bound on per-node rate limiter buckets.
    #[serde(alias = "maxTrackedSenders")]
    pub max_tracked_senders: usize,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            f: 1,
            node_rate_limiter: RateLimiterConfig::default(),
            max_allowed_message_age_sec: 300,
            default_timeout_ms: 10_000,
            max_timeout_ms: 60_000,
            reply_timeout_ms: 5_000,
            callback_ttl_ms: 60_000,
            consensus_interval_ms: 10_000,
            snapshot_retention_sec: 300,
            max_tracked_senders: 10_000,
        }
    }
}

impl HandlerConfig {
    /// Parses the handler JSON config blob. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns the decode error for malformed JSON or mistyped fields.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Validates the configuration for correctness and consistency.
    ///
    /// # Errors
    ///
    /// Returns a descriptive error string if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        self.node_rate_limiter.validate().map_err(|e| format!("handler.node_rate_limiter: {e}"))?;

        if self.max_allowed_message_age_sec == 0 {
            return Err("handler.max_allowed_message_age_sec must be greater than 0".to_string());
        }
        if self.default_timeout_ms == 0 {
            return Err("handler.default_timeout_ms must be greater than 0".to_string());
        }
        if self.max_timeout_ms < self.default_timeout_ms {
            return Err(format!(
                "handler.max_timeout_ms ({}) must be at least default_timeout_ms ({})",
                self.max_timeout_ms, self.default_timeout_ms
            ));
        }
        for (name, value) in [
            ("reply_timeout_ms", self.reply_timeout_ms),
            ("callback_ttl_ms", self.callback_ttl_ms),
            ("consensus_interval_ms", self.consensus_interval_ms),
            ("snapshot_retention_sec", self.snapshot_retention_sec),
        ] {
            if value == 0 {
                return Err(format!("handler.{name} must be greater than 0"));
            }
        }
        if self.max_tracked_senders == 0 {
            return Err("handler.max_tracked_senders must be greater than 0".to_string());
        }
        Ok(())
    }

    #[must_use]
    pub fn consensus_config(&self) -> ConsensusConfig {
        ConsensusConfig {
            f: self.f,
            snapshot_retention: Duration::from_secs(self.snapshot_retention_sec),
        }
    }

    #[must_use]
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    #[must_use]
    pub fn callback_ttl(&self) -> Duration {
        Duration::from_millis(self.callback_ttl_ms)
    }

    #[must_use]
    pub fn consensus_interval(&self) -> Duration {
        Duration::from_millis(self.consensus_interval_ms)
    }

    /// Outbound call deadlines: the default for `timeoutMs <= 0`, the clamp, and the
    /// reply send bound.
    #[must_use]
    pub fn outbound_timeouts(&self) -> OutboundTimeouts {
        OutboundTimeouts {
            default: Duration::from_millis(self.default_timeout_ms),
            max: Duration::from_millis(self.max_timeout_ms),
            reply: self.reply_timeout(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level for this crate when `RUST_LOG` is unset (`trace` .. `error`).
    pub level: String,
    /// `json` or `pretty`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

/// Root configuration of a gateway process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub handler: HandlerConfig,
    pub don: DonConfig,
    pub http_client: HttpClientConfig,
    pub logging: LoggingConfig,
}

impl GatewayConfig {
    /// Loads configuration from a TOML file layered over defaults and env overrides.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, or deserialized.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config_builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("GATEWAY").prefix_separator("__").separator("__"))
            .build()?;

        config_builder.try_deserialize()
    }

    /// Loads configuration from `config/gateway.toml` with fallback to defaults.
    ///
    /// The path can be overridden with the `GATEWAY_CONFIG` environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("GATEWAY_CONFIG").unwrap_or_else(|_| "config/gateway.toml".to_string());
        Self::from_file(&config_path)
    }

    /// Validates the configuration for correctness and consistency.
    ///
    /// # Errors
    ///
    /// Returns a descriptive error string if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        self.handler.validate()?;
        self.don.validate()?;

        if self.http_client.concurrent_limit == 0 {
            return Err("http_client.concurrent_limit must be greater than 0".to_string());
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err("Logging format must be 'json' or 'pretty'".to_string());
        }

        Ok(())
    }
}
