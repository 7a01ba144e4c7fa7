//! Builders for messages, configs and routers shared by the scenario tests.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use gateway_core::{
    config::HandlerConfig,
    don::{DonConfig, DonMember},
    network::HttpClient,
    trigger::TriggerConfigValidator,
    types::{
        Message, METHOD_WEB_API_TARGET, METHOD_WEB_API_TRIGGER,
        METHOD_WEB_API_TRIGGER_UPDATE_METADATA,
    },
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use super::{MockDon, MockHttpClient};

pub const DON_ID: &str = "workflow_don_1";

/// Four node addresses, enough for `F = 1`.
pub const NODES: [&str; 4] = ["0xnode1", "0xnode2", "0xnode3", "0xnode4"];

#[must_use]
pub fn don_config() -> DonConfig {
    DonConfig {
        don_id: DON_ID.to_string(),
        members: NODES
            .iter()
            .enumerate()
            .map(|(i, addr)| DonMember {
                name: format!("node-{}", i + 1),
                address: (*addr).to_string(),
            })
            .collect(),
    }
}

/// Router over a [`MockDon`] and an arbitrary HTTP client.
///
/// # Panics
///
/// Panics if `config` is invalid.
#[must_use]
pub fn create_router(
    config: HandlerConfig,
    don: Arc<MockDon>,
    http: Arc<dyn HttpClient>,
) -> Router {
    Router::new(config, don_config(), don, http, Arc::new(TriggerConfigValidator))
        .expect("router config should be valid")
}

/// Router with default config, a [`MockDon`] and a [`MockHttpClient`] answering `200 {}`.
#[must_use]
pub fn create_default_router() -> (Router, Arc<MockDon>, Arc<MockHttpClient>) {
    let don = Arc::new(MockDon::new());
    let http = Arc::new(MockHttpClient::default());
    let router = create_router(HandlerConfig::default(), don.clone(), http.clone());
    (router, don, http)
}

#[must_use]
pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}

/// Caller trigger request timestamped `timestamp` (unix seconds).
#[must_use]
pub fn create_trigger_request(id: &str, timestamp: i64) -> Message {
    let payload = json!({
        "trigger_id": "web-api-trigger@1.0.0",
        "trigger_event_id": "action_1234567890",
        "timestamp": timestamp,
        "topics": ["daily_price_update"],
        "params": {"bid": "101", "ask": "102"}
    });
    Message::new(id, METHOD_WEB_API_TRIGGER, DON_ID, &payload).expect("payload serializes")
}

/// A node's response to trigger request `id`.
#[must_use]
pub fn create_node_response(id: &str, node: &str) -> Message {
    Message::new(id, METHOD_WEB_API_TRIGGER, DON_ID, &json!({ "node": node, "accepted": true }))
        .expect("payload serializes")
}

/// A node's request for the gateway to call `url`.
#[must_use]
pub fn create_outbound_request(id: &str, url: &str, timeout_ms: i64) -> Message {
    let payload = json!({
        "method": "POST",
        "url": url,
        "headers": {"Content-Type": "application/json"},
        "body": STANDARD.encode(br#"{"query":"price"}"#),
        "timeoutMs": timeout_ms
    });
    let mut msg =
        Message::new(id, METHOD_WEB_API_TARGET, DON_ID, &payload).expect("payload serializes");
    msg.signature = format!("sig-{id}");
    msg
}

/// Trigger config as nodes report it, distinguished by `topic`.
#[must_use]
pub fn create_trigger_config(topic: &str) -> Value {
    json!({
        "allowedSenders": ["0x853d51d5d9935964267a5050aC53aa63ECA39bc5"],
        "allowedTopics": [topic],
        "rateLimiter": {
            "globalBurst": 101,
            "globalRPS": 100.0,
            "perSenderBurst": 103,
            "perSenderRPS": 102.0
        },
        "requiredParams": ["bid", "ask"]
    })
}

/// Metadata update carrying one config per trigger id.
#[must_use]
pub fn create_metadata_update(entries: &[(&str, &Value)]) -> Message {
    let payload: serde_json::Map<String, Value> = entries
        .iter()
        .map(|(trigger_id, config)| {
            ((*trigger_id).to_string(), json!(STANDARD.encode(config.to_string())))
        })
        .collect();
    Message::new("metadata", METHOD_WEB_API_TRIGGER_UPDATE_METADATA, DON_ID, &payload)
        .expect("payload serializes")
}
