// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shared fixtures for the surface integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use facegate_core::application::event_dispatcher::{EventDispatcher, RetryPolicy};
use facegate_core::application::fanout::ResultFanout;
use facegate_core::application::normalizer::RequestNormalizer;
use facegate_core::application::orchestrator::DetectionOrchestrator;
use facegate_core::application::DetectionService;
use facegate_core::domain::detection::{BoundingBox, Detection, ImageRef};
use facegate_core::domain::detector::{Detector, DetectorError};
use facegate_core::domain::events::EventPublisher;
use facegate_core::domain::gateway_config::RequestConfig;
use facegate_core::infrastructure::detectors::DetectorRegistry;
use facegate_core::infrastructure::event_bus::EventBus;
use facegate_core::presentation::api::{app, AppState};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceExt;

/// 1x1 red PNG
pub const RED_PIXEL: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8DwHwAFBQIAX8jx0gAAAABJRU5ErkJggg==";

pub const BUDGET: Duration = Duration::from_millis(200);

/// Returns a fixed answer after an optional delay, counting calls.
pub struct StubDetector {
    pub detections: Vec<Detection>,
    pub delay: Duration,
    pub healthy: bool,
    pub calls: AtomicUsize,
}

impl StubDetector {
    pub fn returning(detections: Vec<Detection>) -> Arc<Self> {
        Arc::new(Self {
            detections,
            delay: Duration::ZERO,
            healthy: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn one_face() -> Arc<Self> {
        Self::returning(vec![Detection::new(
            BoundingBox::new(120.0, 55.0, 250.0, 200.0),
            0.91,
        )])
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            detections: vec![Detection::new(BoundingBox::new(0.0, 0.0, 5.0, 5.0), 0.99)],
            delay,
            healthy: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            detections: vec![],
            delay: Duration::ZERO,
            healthy: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Detector for StubDetector {
    async fn detect(&self, _image: &ImageRef, _floor: f32) -> Result<Vec<Detection>, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.detections.clone())
    }

    async fn health_check(&self) -> Result<(), DetectorError> {
        if self.healthy {
            Ok(())
        } else {
            Err(DetectorError::Network("connection refused".to_string()))
        }
    }
}

pub struct Harness {
    pub router: Router,
    pub bus: EventBus,
    pub service: Arc<DetectionService>,
}

pub fn harness(detector: Arc<StubDetector>) -> Harness {
    harness_with(detector, RequestConfig::default(), None)
}

pub fn harness_with(
    detector: Arc<StubDetector>,
    request: RequestConfig,
    metrics: Option<PrometheusHandle>,
) -> Harness {
    let bus = EventBus::new(64);
    let registry = Arc::new(DetectorRegistry::new("default", detector));
    let sinks: Vec<Arc<dyn EventPublisher>> = vec![Arc::new(bus.clone())];

    let service = Arc::new(DetectionService::new(
        RequestNormalizer::new(&request),
        DetectionOrchestrator::new(registry.clone(), BUDGET),
        ResultFanout::new(
            EventDispatcher::new(sinks, RetryPolicy::default()),
            "facegate-test",
        ),
    ));

    let mut state = AppState::new(service.clone(), bus.clone(), registry).unwrap();
    if let Some(handle) = metrics {
        state = state.with_metrics(handle);
    }
    let router = app(state, request.max_image_bytes);

    Harness {
        router,
        bus,
        service,
    }
}

pub async fn post_json(router: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    post_json_with_header(router, uri, body, ("x-test", "1")).await
}

pub async fn post_json_with_header(
    router: &Router,
    uri: &str,
    body: serde_json::Value,
    (name, value): (&str, &str),
) -> Response<Body> {
    router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .header(name, value)
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn post_raw(router: &Router, uri: &str, body: impl Into<Body>) -> Response<Body> {
    router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(body.into())
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn delete_with_header(
    router: &Router,
    uri: &str,
    (name, value): (&str, &str),
) -> Response<Body> {
    router
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .header(name, value)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn get(router: &Router, uri: &str) -> Response<Body> {
    router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
