// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Request metrics as rendered on `/metrics`.
//!
//! The Prometheus recorder is process-global, so this binary holds a single
//! test that drives every terminal path before reading the exposition.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::*;
use facegate_core::domain::gateway_config::RequestConfig;
use facegate_core::infrastructure::telemetry;
use serde_json::json;

/// Value of the first sample line for `series`, e.g. `name{status="ok"}`.
fn sample(exposition: &str, series: &str) -> Option<f64> {
    exposition.lines().find_map(|line| {
        let value = line.strip_prefix(series)?.trim();
        value.parse().ok()
    })
}

#[tokio::test]
async fn test_requests_and_latency_by_status() {
    let handle = telemetry::install_prometheus_recorder().unwrap();
    let h = harness_with(
        StubDetector::slow(Duration::from_millis(150)),
        RequestConfig::default(),
        Some(handle),
    );

    let ok = post_json(
        &h.router,
        "/detect_face",
        json!({ "image": { "url": "https://example.com/a.jpg" } }),
    )
    .await;
    assert_eq!(ok.status(), StatusCode::OK);

    let malformed = post_raw(&h.router, "/detect_face", "not json").await;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

    let schema = body_json(
        post_json(
            &h.router,
            "/mcp",
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "tools/call",
                "params": {
                    "name": "detect_face",
                    "arguments": { "image_url": "https://example.com/a.jpg", "confidence": 1.5 }
                }
            }),
        )
        .await,
    )
    .await;
    assert_eq!(schema["error"]["code"], -32602);

    let router = h.router.clone();
    let dropped = tokio::spawn(async move {
        post_json(
            &router,
            "/detect_face",
            json!({ "image": { "url": "https://example.com/a.jpg" } }),
        )
        .await
    });
    tokio::time::sleep(Duration::from_millis(60)).await;
    dropped.abort();
    let _ = dropped.await;

    let response = get(&h.router, "/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    assert_eq!(sample(&text, r#"facegate_requests_total{status="ok"}"#), Some(1.0));
    assert_eq!(
        sample(&text, r#"facegate_requests_total{status="invalid_request"}"#),
        Some(2.0)
    );
    assert_eq!(
        sample(&text, r#"facegate_requests_total{status="canceled"}"#),
        Some(1.0)
    );

    assert_eq!(
        sample(&text, r#"facegate_detection_latency_ms_count{status="ok"}"#),
        Some(1.0)
    );
    assert!(sample(&text, r#"facegate_detection_latency_ms_sum{status="ok"}"#).unwrap() >= 140.0);

    // The drop path records the time actually spent, not zero
    assert_eq!(
        sample(&text, r#"facegate_detection_latency_ms_count{status="canceled"}"#),
        Some(1.0)
    );
    assert!(sample(&text, r#"facegate_detection_latency_ms_sum{status="canceled"}"#).unwrap() >= 40.0);

    // Rejections never reach a detector, so they stay out of the histogram
    assert_eq!(
        sample(&text, r#"facegate_detection_latency_ms_count{status="invalid_request"}"#),
        None
    );
}
