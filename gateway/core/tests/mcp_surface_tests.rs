// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the MCP `detect_face` tool over `POST /mcp`.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use axum::Router;
use common::*;
use facegate_core::infrastructure::event_bus::EventBusError;
use facegate_core::presentation::mcp::SESSION_HEADER;
use serde_json::json;

fn rpc(id: u64, method: &str, params: serde_json::Value) -> serde_json::Value {
    json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
}

fn detect_call(id: u64) -> serde_json::Value {
    rpc(
        id,
        "tools/call",
        json!({ "name": "detect_face", "arguments": { "image_url": "https://example.com/a.jpg" } }),
    )
}

fn cancelled(request_id: u64) -> serde_json::Value {
    json!({
        "jsonrpc": "2.0",
        "method": "notifications/cancelled",
        "params": { "requestId": request_id, "reason": "user aborted" }
    })
}

/// Run `initialize` and return the issued session id.
async fn open_session(router: &Router) -> String {
    let response = post_json(router, "/mcp", rpc(1, "initialize", json!({}))).await;
    assert_eq!(response.status(), StatusCode::OK);
    response.headers()[SESSION_HEADER].to_str().unwrap().to_string()
}

#[tokio::test]
async fn test_initialize_and_list_tools() {
    let h = harness(StubDetector::one_face());

    let init = body_json(post_json(&h.router, "/mcp", rpc(1, "initialize", json!({}))).await).await;
    assert_eq!(init["id"], 1);
    assert_eq!(init["result"]["serverInfo"]["name"], "facegate");
    assert!(init["result"]["capabilities"]["tools"].is_object());

    let list = body_json(post_json(&h.router, "/mcp", rpc(2, "tools/list", json!({}))).await).await;
    let tools = list["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["name"], "detect_face");
    assert_eq!(tools[0]["inputSchema"]["properties"]["confidence"]["maximum"], 1);
    assert!(tools[0]["outputSchema"].is_object());
}

#[tokio::test]
async fn test_tool_call_returns_structured_output_without_request_id() {
    let h = harness(StubDetector::one_face());
    let mut events = h.bus.subscribe();

    let response = post_json(
        &h.router,
        "/mcp",
        rpc(
            3,
            "tools/call",
            json!({ "name": "detect_face", "arguments": { "image_url": "https://example.com/a.jpg" } }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let output = &body["result"]["structuredContent"];
    assert_eq!(body["result"]["isError"], false);
    assert_eq!(output["detections"][0]["bbox"], json!([120.0, 55.0, 250.0, 200.0]));
    assert!(output["latency_ms"].is_u64());
    assert!(output.get("request_id").is_none());
    assert_eq!(body["result"]["content"][0]["type"], "text");

    let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.image_uri, "https://example.com/a.jpg");
}

#[tokio::test]
async fn test_schema_violation_is_invalid_params() {
    let detector = StubDetector::one_face();
    let h = harness(detector.clone());

    let response = post_json(
        &h.router,
        "/mcp",
        rpc(
            4,
            "tools/call",
            json!({ "name": "detect_face", "arguments": { "image_url": "https://example.com/a.jpg", "confidence": 1.5 } }),
        ),
    )
    .await;

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32602);
    assert_eq!(body["error"]["data"]["error_code"], "INVALID_REQUEST");
    assert!(!body["error"]["data"]["violations"].as_array().unwrap().is_empty());
    assert_eq!(detector.calls(), 0);
}

#[tokio::test]
async fn test_missing_image_url_is_invalid_params() {
    let h = harness(StubDetector::one_face());

    let response = post_json(
        &h.router,
        "/mcp",
        rpc(5, "tools/call", json!({ "name": "detect_face", "arguments": {} })),
    )
    .await;

    assert_eq!(body_json(response).await["error"]["code"], -32602);
}

#[tokio::test]
async fn test_timeout_maps_to_server_error_code() {
    let h = harness(StubDetector::slow(Duration::from_secs(3)));

    let response = post_json(
        &h.router,
        "/mcp",
        rpc(
            6,
            "tools/call",
            json!({ "name": "detect_face", "arguments": { "image_url": "https://example.com/a.jpg" } }),
        ),
    )
    .await;

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32001);
    assert_eq!(body["error"]["data"]["status"], "timeout");
}

#[tokio::test]
async fn test_cancelled_notification_stops_tool_call() {
    let h = harness(StubDetector::slow(Duration::from_millis(150)));
    let mut events = h.bus.subscribe();
    let session = open_session(&h.router).await;

    let router = h.router.clone();
    let call_session = session.clone();
    let running = tokio::spawn(async move {
        post_json_with_header(&router, "/mcp", detect_call(42), (SESSION_HEADER, &call_session)).await
    });

    tokio::time::sleep(Duration::from_millis(30)).await;
    let notification =
        post_json_with_header(&h.router, "/mcp", cancelled(42), (SESSION_HEADER, &session)).await;
    assert_eq!(notification.status(), StatusCode::ACCEPTED);

    let body = body_json(running.await.unwrap()).await;
    assert_eq!(body["error"]["code"], -32800);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(matches!(events.try_recv(), Err(EventBusError::Empty)));
}

#[tokio::test]
async fn test_cancel_stays_within_its_session() {
    let h = harness(StubDetector::slow(Duration::from_millis(150)));
    let session_a = open_session(&h.router).await;
    let session_b = open_session(&h.router).await;
    assert_ne!(session_a, session_b);

    let spawn_call = |session: String| {
        let router = h.router.clone();
        tokio::spawn(async move {
            post_json_with_header(&router, "/mcp", detect_call(1), (SESSION_HEADER, &session)).await
        })
    };
    let call_a = spawn_call(session_a.clone());
    let call_b = spawn_call(session_b.clone());

    tokio::time::sleep(Duration::from_millis(30)).await;
    post_json_with_header(&h.router, "/mcp", cancelled(1), (SESSION_HEADER, &session_a)).await;

    let a = body_json(call_a.await.unwrap()).await;
    let b = body_json(call_b.await.unwrap()).await;
    assert_eq!(a["error"]["code"], -32800);
    assert_eq!(b["result"]["isError"], false);
}

#[tokio::test]
async fn test_http_cancel_cannot_reach_mcp_call() {
    let h = harness(StubDetector::slow(Duration::from_millis(150)));
    let session = open_session(&h.router).await;

    let router = h.router.clone();
    let call_session = session.clone();
    let running = tokio::spawn(async move {
        post_json_with_header(&router, "/mcp", detect_call(1), (SESSION_HEADER, &call_session)).await
    });

    tokio::time::sleep(Duration::from_millis(30)).await;
    let scoped = format!("mcp:{session}:1");
    for target in ["mcp:1", scoped.as_str()] {
        let uri = format!("/detect_face/{}/cancel", target);
        let response = post_json(&h.router, &uri, json!({})).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    let body = body_json(running.await.unwrap()).await;
    assert_eq!(body["result"]["isError"], false);
}

#[tokio::test]
async fn test_sessionless_cancel_is_ignored() {
    let h = harness(StubDetector::slow(Duration::from_millis(100)));

    let router = h.router.clone();
    let running = tokio::spawn(async move { post_json(&router, "/mcp", detect_call(5)).await });

    tokio::time::sleep(Duration::from_millis(30)).await;
    let notification = post_json(&h.router, "/mcp", cancelled(5)).await;
    assert_eq!(notification.status(), StatusCode::ACCEPTED);

    let body = body_json(running.await.unwrap()).await;
    assert_eq!(body["result"]["isError"], false);
}

#[tokio::test]
async fn test_session_termination() {
    let h = harness(StubDetector::one_face());
    let session = open_session(&h.router).await;

    let ping = post_json_with_header(
        &h.router,
        "/mcp",
        rpc(2, "ping", json!({})),
        (SESSION_HEADER, &session),
    )
    .await;
    assert_eq!(ping.status(), StatusCode::OK);

    let closed = delete_with_header(&h.router, "/mcp", (SESSION_HEADER, &session)).await;
    assert_eq!(closed.status(), StatusCode::NO_CONTENT);
    let again = delete_with_header(&h.router, "/mcp", (SESSION_HEADER, &session)).await;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
    let missing = delete_with_header(&h.router, "/mcp", ("x-test", "1")).await;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    let stale = post_json_with_header(
        &h.router,
        "/mcp",
        rpc(3, "ping", json!({})),
        (SESSION_HEADER, &session),
    )
    .await;
    assert_eq!(stale.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(stale).await["error"]["code"], -32600);
}

#[tokio::test]
async fn test_protocol_errors() {
    let h = harness(StubDetector::one_face());

    let unknown = body_json(post_json(&h.router, "/mcp", rpc(7, "resources/list", json!({}))).await).await;
    assert_eq!(unknown["error"]["code"], -32601);

    let wrong_tool = body_json(
        post_json(
            &h.router,
            "/mcp",
            rpc(8, "tools/call", json!({ "name": "recognize_face", "arguments": {} })),
        )
        .await,
    )
    .await;
    assert_eq!(wrong_tool["error"]["code"], -32602);

    let bad_version = body_json(
        post_json(&h.router, "/mcp", json!({ "jsonrpc": "1.0", "id": 9, "method": "ping" })).await,
    )
    .await;
    assert_eq!(bad_version["error"]["code"], -32600);

    let ping = body_json(post_json(&h.router, "/mcp", rpc(10, "ping", json!({}))).await).await;
    assert_eq!(ping["result"], json!({}));
}
