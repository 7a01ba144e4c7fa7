//! Outbound HTTP calls brokered for DON nodes.
//!
//! - per-node admission (burst N admits N, rejects N+1)
//! - calls survive the caller future being dropped
//! - node-requested deadlines bound each call
//! - `close` drains calls in flight
//! - the reqwest client against a mockito target

use crate::mock_infrastructure::{
    create_outbound_request, create_router, MockDon, MockHttpClient, TargetMockBuilder, NODES,
};
use gateway_core::{
    config::HandlerConfig,
    middleware::RateLimiterConfig,
    network::{NetworkError, ReqwestHttpClient},
    types::{OutboundResponsePayload, METHOD_COMPUTE_ACTION},
    GatewayError,
};
use std::{sync::Arc, time::Duration};

fn limited_config(per_sender_burst: i64) -> HandlerConfig {
    HandlerConfig {
        node_rate_limiter: RateLimiterConfig {
            global_rps: 1_000.0,
            global_burst: 1_000,
            per_sender_rps: 0.001,
            per_sender_burst,
        },
        ..HandlerConfig::default()
    }
}

#[tokio::test]
async fn test_rate_limit_admits_burst_then_rejects() {
    const BURST: i64 = 3;
    let don = Arc::new(MockDon::new());
    let http = Arc::new(MockHttpClient::default());
    let router = create_router(limited_config(BURST), don.clone(), http.clone());

    for i in 0..BURST {
        let msg = create_outbound_request(&format!("call-{i}"), "https://example.com", 1_000);
        router.handle_node_message(msg, NODES[0]).unwrap();
    }
    let err = router
        .handle_node_message(
            create_outbound_request("call-x", "https://example.com", 1_000),
            NODES[0],
        )
        .unwrap_err();
    assert!(matches!(err, GatewayError::RateLimited(ref node) if node == NODES[0]));

    // Another node has its own budget.
    router
        .handle_node_message(
            create_outbound_request("call-y", "https://example.com", 1_000),
            NODES[1],
        )
        .unwrap();

    router.close().await;
    assert_eq!(http.requests().len(), 4);
    assert_eq!(don.sent_to(NODES[0]).len(), 3);
    assert_eq!(don.sent_to(NODES[1]).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_call_survives_dropped_caller() {
    let don = Arc::new(MockDon::new());
    let http = Arc::new(MockHttpClient::default().with_delay(Duration::from_secs(2)));
    let router = Arc::new(create_router(HandlerConfig::default(), don.clone(), http.clone()));

    let caller = {
        let router = Arc::clone(&router);
        tokio::spawn(async move {
            router
                .handle_node_message(
                    create_outbound_request("m1", "https://example.com", 5_000),
                    NODES[0],
                )
                .unwrap();
            std::future::pending::<()>().await;
        })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    caller.abort();
    assert!(caller.await.unwrap_err().is_cancelled());

    don.wait_for_sends(1).await;
    assert_eq!(http.completed(), 1);
    let reply = &don.sent_to(NODES[0])[0];
    let payload: OutboundResponsePayload = reply.decode_payload().unwrap();
    assert!(!payload.execution_error);
    assert_eq!(payload.status_code, 200);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_reported_as_execution_error() {
    let don = Arc::new(MockDon::new());
    let http = Arc::new(MockHttpClient::default().with_delay(Duration::from_secs(30)));
    let router = create_router(HandlerConfig::default(), don.clone(), http.clone());

    router
        .handle_node_message(create_outbound_request("m1", "https://example.com", 200), NODES[2])
        .unwrap();
    router.close().await;

    assert_eq!(http.completed(), 0);
    let reply = &don.sent_to(NODES[2])[0];
    assert_eq!(reply.id(), "m1");
    assert_eq!(reply.signature, "sig-m1");
    let payload: OutboundResponsePayload = reply.decode_payload().unwrap();
    assert!(payload.execution_error);
    assert_eq!(payload.error_message, NetworkError::Timeout.to_string());
}

#[tokio::test(start_paused = true)]
async fn test_zero_timeout_uses_default_deadline() {
    let don = Arc::new(MockDon::new());
    let http = Arc::new(MockHttpClient::default());
    let config = HandlerConfig { default_timeout_ms: 7_000, ..HandlerConfig::default() };
    let router = create_router(config, don, http.clone());

    router
        .handle_node_message(create_outbound_request("m1", "https://example.com", 0), NODES[0])
        .unwrap();
    router.close().await;

    assert_eq!(http.requests()[0].timeout, Duration::from_millis(7_000));
}

#[tokio::test(start_paused = true)]
async fn test_close_drains_in_flight_calls() {
    let don = Arc::new(MockDon::new());
    let http = Arc::new(MockHttpClient::default().with_delay(Duration::from_secs(1)));
    let router = create_router(HandlerConfig::default(), don.clone(), http.clone());
    router.start();

    for (i, node) in NODES.iter().enumerate() {
        let msg = create_outbound_request(&format!("m{i}"), "https://example.com", 5_000);
        router.handle_node_message(msg, node).unwrap();
    }

    router.close().await;
    router.close().await;

    assert_eq!(http.completed(), NODES.len());
    assert_eq!(don.sent_count(), NODES.len());
    assert_eq!(router.outbound().in_flight(), 0);

    let err = router
        .handle_node_message(
            create_outbound_request("late", "https://example.com", 1_000),
            NODES[0],
        )
        .unwrap_err();
    assert!(matches!(err, GatewayError::ShuttingDown));
}

#[tokio::test]
async fn test_failed_reply_send_is_not_retried() {
    let don = Arc::new(MockDon::new());
    don.set_unreachable(NODES[0]);
    let http = Arc::new(MockHttpClient::default());
    let router = create_router(HandlerConfig::default(), don.clone(), http.clone());

    router
        .handle_node_message(create_outbound_request("m1", "https://example.com", 1_000), NODES[0])
        .unwrap();
    router.close().await;

    assert_eq!(http.requests().len(), 1);
    assert_eq!(don.sent_count(), 0);
}

#[tokio::test]
async fn test_reqwest_client_against_target() {
    let mut target = TargetMockBuilder::new().await;
    target.mock_post_with_body("/price", r#"{"query":"price"}"#, r#"{"price":42}"#);

    let don = Arc::new(MockDon::new());
    let http = Arc::new(ReqwestHttpClient::new().unwrap());
    let router = create_router(HandlerConfig::default(), don.clone(), http);

    let url = format!("{}/price", target.url());
    let mut msg = create_outbound_request("m1", &url, 5_000);
    msg.body.method = METHOD_COMPUTE_ACTION.to_string();
    router.handle_node_message(msg, NODES[1]).unwrap();
    router.close().await;

    target.assert_all();
    let reply = &don.sent_to(NODES[1])[0];
    assert_eq!(reply.method(), METHOD_COMPUTE_ACTION);
    let payload: OutboundResponsePayload = reply.decode_payload().unwrap();
    assert!(!payload.execution_error);
    assert_eq!(payload.status_code, 200);
    assert_eq!(&payload.body[..], br#"{"price":42}"#);
}

#[tokio::test]
async fn test_reqwest_client_reports_http_errors_as_responses() {
    let mut target = TargetMockBuilder::new().await;
    target.mock_json("POST", "/missing", 404, r#"{"error":"not found"}"#);

    let don = Arc::new(MockDon::new());
    let http = Arc::new(ReqwestHttpClient::new().unwrap());
    let router = create_router(HandlerConfig::default(), don.clone(), http);

    let url = format!("{}/missing", target.url());
    router.handle_node_message(create_outbound_request("m1", &url, 5_000), NODES[0]).unwrap();
    router.close().await;

    let payload: OutboundResponsePayload = don.sent_to(NODES[0])[0].decode_payload().unwrap();
    assert!(!payload.execution_error);
    assert_eq!(payload.status_code, 404);
    assert_eq!(payload.headers.get("content-type").map(String::as_str), Some("application/json"));
}

#[tokio::test]
async fn test_reqwest_client_does_not_follow_redirects() {
    let mut target = TargetMockBuilder::new().await;
    target.mock_redirect("/moved", "https://example.com/elsewhere");

    let don = Arc::new(MockDon::new());
    let http = Arc::new(ReqwestHttpClient::new().unwrap());
    let router = create_router(HandlerConfig::default(), don.clone(), http);

    let mut msg = create_outbound_request("m1", &format!("{}/moved", target.url()), 5_000);
    let mut payload: serde_json::Value = msg.decode_payload().unwrap();
    payload["method"] = "GET".into();
    payload["body"] = "".into();
    msg.body.payload = serde_json::value::to_raw_value(&payload).unwrap();
    router.handle_node_message(msg, NODES[0]).unwrap();
    router.close().await;

    let payload: OutboundResponsePayload = don.sent_to(NODES[0])[0].decode_payload().unwrap();
    assert_eq!(payload.status_code, 302);
}
