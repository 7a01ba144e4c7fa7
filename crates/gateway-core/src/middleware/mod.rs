//! Admission control for node-originated work.
//!
//! Only the outbound HTTP path is rate limited. The limiter keeps one global token
//! bucket plus one bucket per sending node, and a request passes only when both have a
//! token:
//!
//! ```text
//!   node request ──► global bucket ──► per-node bucket ──► dispatcher
//!                        │ empty             │ empty
//!                        └──────► RateLimited ◄┘
//! ```
//!
//! Refill is continuous: `tokens = min(tokens + elapsed_secs * rps, burst)`.

pub mod rate_limiting;

pub use rate_limiting::{RateLimiter, RateLimiterConfig, RateLimiterError};
