use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Limits for the node-facing rate limiter.
///
/// Serialized with the handler config blob names (`globalRPS`, `perSenderBurst`, ...);
/// snake_case names are accepted for TOML and env configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    #[serde(rename = "globalRPS", alias = "global_rps")]
    pub global_rps: f64,
    #[serde(rename = "globalBurst", alias = "global_burst")]
    pub global_burst: i64,
    #[serde(rename = "perSenderRPS", alias = "per_sender_rps")]
    pub per_sender_rps: f64,
    #[serde(rename = "perSenderBurst", alias = "per_sender_burst")]
    pub per_sender_burst: i64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self { global_rps: 100.0, global_burst: 100, per_sender_rps: 10.0, per_sender_burst: 10 }
    }
}

impl RateLimiterConfig {
    /// Checks that every rate and burst is usable.
    ///
    /// # Errors
    ///
    /// Returns an error for negative or non-finite rates, negative bursts, and a zero
    /// burst paired with a positive rate.
    pub fn validate(&self) -> Result<(), RateLimiterError> {
        check_pair("global", self.global_rps, self.global_burst)?;
        check_pair("per_sender", self.per_sender_rps, self.per_sender_burst)
    }
}

fn check_pair(scope: &'static str, rps: f64, burst: i64) -> Result<(), RateLimiterError> {
    if !rps.is_finite() || rps < 0.0 {
        return Err(RateLimiterError::InvalidRate { scope, value: rps });
    }
    if burst < 0 {
        return Err(RateLimiterError::InvalidBurst { scope, value: burst });
    }
    if burst == 0 && rps > 0.0 {
        return Err(RateLimiterError::ZeroBurst { scope });
    }
    Ok(())
}

#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum RateLimiterError {
    #[error("invalid {scope} rate: {value}")]
    InvalidRate { scope: &'static str, value: f64 },

    #[error("invalid {scope} burst: {value}")]
    InvalidBurst { scope: &'static str, value: i64 },

    #[error("{scope} burst must be positive when its rate is positive")]
    ZeroBurst { scope: &'static str },
}

/// Token-bucket admission keyed by sender identity, behind a shared global bucket.
///
/// A request is admitted only when both the global bucket and the sender's bucket hold
/// a token; on admission one token is taken from each.
///
/// **Security**: Limits maximum tracked senders to prevent OOM from spoofed identities.
pub struct RateLimiter {
    global: Mutex<TokenBucket>,
    senders: DashMap<String, TokenBucket>,
    config: RateLimiterConfig,
    max_tracked_senders: usize,
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    last_access: Instant,
}

impl TokenBucket {
    #[allow(clippy::cast_precision_loss)]
    fn full(burst: i64, now: Instant) -> Self {
        Self { tokens: burst as f64, last_refill: now, last_access: now }
    }

    #[allow(clippy::cast_precision_loss)]
    fn refill(&mut self, now: Instant, rps: f64, burst: i64) {
        self.last_access = now;

        let capacity = burst as f64;
        let elapsed = now.saturating_duration_since(self.last_refill);
        let tokens_to_add = (elapsed.as_secs_f64() * rps).min(capacity);

        if tokens_to_add > 0.0 {
            self.tokens = (self.tokens + tokens_to_add).min(capacity);
            self.last_refill = now;
        }
    }

    fn has_token(&self) -> bool {
        self.tokens >= 1.0
    }

    fn take(&mut self) {
        self.tokens -= 1.0;
    }
}

impl RateLimiter {
    pub const DEFAULT_MAX_TRACKED_SENDERS: usize = 10_000;

    /// # Errors
    ///
    /// Returns an error when `config` fails [`RateLimiterConfig::validate`].
    pub fn new(config: RateLimiterConfig) -> Result<Self, RateLimiterError> {
        Self::with_max_tracked_senders(config, Self::DEFAULT_MAX_TRACKED_SENDERS)
    }

    /// # Errors
    ///
    /// Returns an error when `config` fails [`RateLimiterConfig::validate`].
    pub fn with_max_tracked_senders(
        config: RateLimiterConfig,
        max_tracked_senders: usize,
    ) -> Result<Self, RateLimiterError> {
        config.validate()?;
        Ok(Self {
            global: Mutex::new(TokenBucket::full(config.global_burst, Instant::now())),
            senders: DashMap::new(),
            config,
            max_tracked_senders,
        })
    }

    /// Admits one request from `sender`. Unknown senders are rejected once the table is
    /// full.
    #[must_use]
    pub fn allow(&self, sender: &str) -> bool {
        let now = Instant::now();
        let cfg = &self.config;

        // Lock order: global bucket, then the sender's shard.
        let mut global = self.global.lock();
        global.refill(now, cfg.global_rps, cfg.global_burst);

        if !self.senders.contains_key(sender) && self.senders.len() >= self.max_tracked_senders {
            return false;
        }

        let mut bucket = self
            .senders
            .entry(sender.to_string())
            .or_insert_with(|| TokenBucket::full(cfg.per_sender_burst, now));
        bucket.refill(now, cfg.per_sender_rps, cfg.per_sender_burst);

        if global.has_token() && bucket.has_token() {
            global.take();
            bucket.take();
            true
        } else {
            false
        }
    }

    /// Drops sender buckets untouched for at least `idle_for`.
    pub fn evict_idle(&self, idle_for: Duration) -> usize {
        let now = Instant::now();
        let before_count = self.senders.len();

        self.senders
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_access) < idle_for);

        before_count.saturating_sub(self.senders.len())
    }

    #[must_use]
    pub fn tracked_senders(&self) -> usize {
        self.senders.len()
    }

    #[must_use]
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("tracked_senders", &self.senders.len())
            .field("max_tracked_senders", &self.max_tracked_senders)
            .finish()
    }
}
