// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Pipeline built from a YAML manifest against a mocked HTTP detector and a
//! mocked webhook sink.

use std::sync::Arc;
use std::time::Duration;

use facegate_core::application::{DetectionService, Surface, SurfaceInput, SurfaceResponse};
use facegate_core::domain::gateway_config::GatewayConfigManifest;
use facegate_core::infrastructure::detectors::DetectorRegistry;
use facegate_core::infrastructure::event_bus::EventBus;
use mockito::Matcher;

fn manifest(detector_url: &str, webhook_url: &str) -> GatewayConfigManifest {
    let yaml = format!(
        r#"
apiVersion: facegate/v1
kind: GatewayConfig
metadata:
  name: pipeline-test
spec:
  slo:
    pool: cpu
    budget: 500ms
  detectors:
    - name: default
      type: http
      endpoint: "{detector_url}"
  default_detector: default
  events:
    source: pipeline-test
    webhook_url: "{webhook_url}"
    retry:
      max_attempts: 3
      initial_backoff: 5ms
      max_backoff: 20ms
"#
    );
    GatewayConfigManifest::from_yaml_str(&yaml).unwrap()
}

#[tokio::test]
async fn test_manifest_pipeline_detects_and_delivers_webhook() {
    let mut detector = mockito::Server::new_async().await;
    let detect = detector
        .mock("POST", "/v1/detect")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "image_url": "https://example.com/group.jpg"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"faces":[
                {"bbox":[120,55,250,200],"score":0.91,"landmarks":{"nose":[180,120]}},
                {"bbox":[300,40,380,130],"score":0.42}
            ]}"#,
        )
        .create_async()
        .await;

    let mut webhook = mockito::Server::new_async().await;
    let delivered = webhook
        .mock("POST", "/face-events")
        .match_header("x-correlation-id", "pipeline-1")
        .with_status(200)
        .create_async()
        .await;

    let manifest = manifest(&detector.url(), &format!("{}/face-events", webhook.url()));
    manifest.validate().unwrap();

    let registry = Arc::new(DetectorRegistry::from_config(&manifest.spec).unwrap());
    let service =
        DetectionService::from_config(&manifest.spec, registry, EventBus::new(16)).unwrap();

    let response = service
        .detect(
            SurfaceInput::from_url("https://example.com/group.jpg").with_correlation_id("pipeline-1"),
            Surface::Api,
        )
        .await
        .unwrap();

    let SurfaceResponse::Api(body) = response else {
        panic!("expected api shape");
    };
    assert_eq!(body.request_id.as_str(), "pipeline-1");
    assert_eq!(body.detections.len(), 1);
    assert_eq!(body.detections[0].confidence, 0.91);
    assert!(body.detections[0].landmarks.contains_key("nose"));
    detect.assert_async().await;

    // Publication is detached from the response
    tokio::time::sleep(Duration::from_millis(200)).await;
    delivered.assert_async().await;
}

#[tokio::test]
async fn test_transient_webhook_failures_are_retried() {
    let mut detector = mockito::Server::new_async().await;
    let _detect = detector
        .mock("POST", "/v1/detect")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"faces":[{"bbox":[1,1,9,9],"score":0.99}]}"#)
        .create_async()
        .await;

    let mut webhook = mockito::Server::new_async().await;
    let unavailable = webhook
        .mock("POST", "/face-events")
        .with_status(503)
        .expect(3)
        .create_async()
        .await;

    let manifest = manifest(&detector.url(), &format!("{}/face-events", webhook.url()));
    let registry = Arc::new(DetectorRegistry::from_config(&manifest.spec).unwrap());
    let service =
        DetectionService::from_config(&manifest.spec, registry, EventBus::new(16)).unwrap();

    // The response is unaffected by the failing sink
    assert!(service
        .detect(SurfaceInput::from_url("https://example.com/a.jpg"), Surface::Api)
        .await
        .is_ok());

    tokio::time::sleep(Duration::from_millis(300)).await;
    unavailable.assert_async().await;
}

#[tokio::test]
async fn test_detector_rejection_is_generic_detector_error() {
    let mut detector = mockito::Server::new_async().await;
    let _detect = detector
        .mock("POST", "/v1/detect")
        .with_status(422)
        .with_body("unsupported image format: image/x-tiff")
        .create_async()
        .await;

    let manifest = manifest(&detector.url(), "http://127.0.0.1:9/unused");
    let registry = Arc::new(DetectorRegistry::from_config(&manifest.spec).unwrap());
    let service =
        DetectionService::from_config(&manifest.spec, registry, EventBus::new(16)).unwrap();

    let err = service
        .detect(SurfaceInput::from_url("https://example.com/a.tiff"), Surface::Api)
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "DETECTOR_ERROR");
    assert!(!err.to_string().contains("tiff"));
}
