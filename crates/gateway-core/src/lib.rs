//! # Gateway Core
//!
//! Web API handler for a gateway sitting between external callers and a Decentralized
//! Oracle Network (DON).
//!
//! - **[`router`]**: Caller fan-out with first-reply correlation, node message dispatch,
//!   and the lifecycle (`start` / `close`) of background work.
//!
//! - **[`trigger`]**: Per-node trigger configuration reports and their validation.
//!
//! - **[`consensus`]**: Hash voting over node reports; a config is accepted once `F + 1`
//!   nodes report identical content.
//!
//! - **[`network`]**: HTTP client used to perform outbound calls requested by nodes.
//!
//! - **[`middleware`]**: Token-bucket rate limiting of node-requested calls.
//!
//! - **[`don`]**: DON membership and the transport trait used to reach nodes.
//!
//! - **[`config`]** and **[`logging`]**: layered configuration and tracing setup.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                            Router                            │
//! │  ┌───────────────┐  ┌────────────────────┐  ┌─────────────┐  │
//! │  │ CallbackTable │  │ OutboundDispatcher │  │ Maintenance │  │
//! │  └───────┬───────┘  └─────────┬──────────┘  └──────┬──────┘  │
//! │          │                    │                    │         │
//! │          │          ┌─────────▼──────────┐  ┌──────▼──────┐  │
//! │          │          │ RateLimiter        │  │ Consensus   │  │
//! │          │          │ HttpClient         │  │ Engine      │  │
//! │          │          └────────────────────┘  └──────┬──────┘  │
//! │          │                                  ┌──────▼──────┐  │
//! │          │                                  │ TriggerMeta │  │
//! │          │                                  │ dataStore   │  │
//! │          │                                  └─────────────┘  │
//! └──────────┼───────────────────────────────────────────────────┘
//!            ▼
//!      caller sinks                 Don::send_to_node ──► DON nodes
//! ```
//!
//! ## Message Flow
//!
//! ```text
//! caller request (web_api_trigger)
//!       │
//!       ▼
//! ┌─────────────┐
//! │  register   │
//! │  callback   │
//! └──────┬──────┘
//!        ▼
//! ┌─────────────┐
//! │ parse, age, │ ─── Invalid ──► error to caller sink
//! │   method    │
//! └──────┬──────┘
//!        │ Valid
//!        ▼
//!  broadcast to every member ──► node replies ──► first reply to caller sink
//! ```

pub mod config;
pub mod consensus;
pub mod don;
pub mod logging;
pub mod middleware;
pub mod network;
pub mod router;
pub mod trigger;
pub mod types;
pub mod utils;

pub use router::{GatewayError, Router};
