// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Result Fan-out
//!
//! Renders one [`DetectionResult`] into the shape of the calling surface and,
//! for successful results only, hands a [`FaceEvent`] to the event dispatcher.
//! The response is computed without waiting on publication.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Pure surface mapping plus the detached event side effect

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::Serialize;

use crate::application::event_dispatcher::EventDispatcher;
use crate::domain::detection::{Detection, DetectionRequest, DetectionResult, RequestId};
use crate::domain::events::FaceEvent;

/// Which response shape the caller expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// HTTP and gRPC
    Api,
    /// MCP tool call
    Mcp,
}

/// HTTP/gRPC body: `{detections, latency_ms, request_id}`
#[derive(Debug, Clone, Serialize)]
pub struct ApiDetectResponse {
    pub detections: Vec<Detection>,
    pub latency_ms: u64,
    pub request_id: RequestId,
}

/// One face in the MCP `detect_face` output.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct McpDetection {
    /// `[x1, y1, x2, y2]` in pixels
    pub bbox: [f32; 4],
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub landmarks: Option<BTreeMap<String, [f32; 2]>>,
}

/// MCP `detect_face` output: `{detections, latency_ms}`
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct McpDetectOutput {
    pub detections: Vec<McpDetection>,
    pub latency_ms: u64,
}

impl From<&Detection> for McpDetection {
    fn from(d: &Detection) -> Self {
        let landmarks = (!d.landmarks.is_empty()).then(|| {
            d.landmarks
                .iter()
                .map(|(name, point)| (name.clone(), [point.x, point.y]))
                .collect()
        });
        Self {
            bbox: d.bbox.to_array(),
            confidence: d.confidence,
            landmarks,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SurfaceResponse {
    Api(ApiDetectResponse),
    Mcp(McpDetectOutput),
}

impl SurfaceResponse {
    pub fn render(result: DetectionResult, surface: Surface) -> Self {
        match surface {
            Surface::Api => SurfaceResponse::Api(ApiDetectResponse {
                detections: result.detections,
                latency_ms: result.latency_ms,
                request_id: result.request_id,
            }),
            Surface::Mcp => SurfaceResponse::Mcp(McpDetectOutput {
                detections: result.detections.iter().map(McpDetection::from).collect(),
                latency_ms: result.latency_ms,
            }),
        }
    }
}

pub struct ResultFanout {
    dispatcher: EventDispatcher,
    source: String,
}

impl ResultFanout {
    pub fn new(dispatcher: EventDispatcher, source: impl Into<String>) -> Self {
        Self {
            dispatcher,
            source: source.into(),
        }
    }

    pub fn fanout(
        &self,
        result: DetectionResult,
        request: &DetectionRequest,
        surface: Surface,
    ) -> SurfaceResponse {
        if let Some(event) = FaceEvent::project(&result, request, &self.source) {
            // Detached; the handle is intentionally not awaited
            let _ = self.dispatcher.dispatch(event);
        }
        SurfaceResponse::render(result, surface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::event_dispatcher::RetryPolicy;
    use crate::domain::detection::{BoundingBox, DetectionStatus, ImageRef};
    use crate::domain::events::EventPublisher;
    use crate::infrastructure::event_bus::{EventBus, EventBusError};
    use std::sync::Arc;
    use std::time::Duration;
    use url::Url;

    fn request() -> DetectionRequest {
        DetectionRequest::new(
            RequestId::from_caller("corr-9").unwrap(),
            ImageRef::Uri(Url::parse("https://example.com/face.jpg").unwrap()),
            0.7,
            None,
        )
    }

    fn result(status: DetectionStatus) -> DetectionResult {
        DetectionResult {
            request_id: RequestId::from_caller("corr-9").unwrap(),
            detections: vec![Detection::new(BoundingBox::new(120.0, 55.0, 250.0, 200.0), 0.91)
                .with_landmark("nose", 180.0, 120.0)],
            latency_ms: 42,
            status,
        }
    }

    fn fanout(bus: &EventBus) -> ResultFanout {
        let sinks: Vec<Arc<dyn EventPublisher>> = vec![Arc::new(bus.clone())];
        ResultFanout::new(EventDispatcher::new(sinks, RetryPolicy::default()), "gateway-test")
    }

    #[test]
    fn test_api_shape() {
        let rendered = SurfaceResponse::render(result(DetectionStatus::Ok), Surface::Api);
        let json = serde_json::to_value(&rendered).unwrap();

        assert_eq!(json["request_id"], "corr-9");
        assert_eq!(json["latency_ms"], 42);
        assert_eq!(json["detections"][0]["bbox"], serde_json::json!([120.0, 55.0, 250.0, 200.0]));
        assert_eq!(json["detections"][0]["landmarks"]["nose"], serde_json::json!([180.0, 120.0]));
    }

    #[test]
    fn test_mcp_shape_has_no_request_id() {
        let rendered = SurfaceResponse::render(result(DetectionStatus::Ok), Surface::Mcp);
        let json = serde_json::to_value(&rendered).unwrap();

        assert!(json.get("request_id").is_none());
        assert_eq!(json["latency_ms"], 42);
        assert_eq!(json["detections"][0]["landmarks"]["nose"], serde_json::json!([180.0, 120.0]));

        let bare = McpDetection::from(&Detection::new(BoundingBox::new(0.0, 0.0, 1.0, 1.0), 0.8));
        let json = serde_json::to_value(&bare).unwrap();
        assert!(json.get("landmarks").is_none());
    }

    #[tokio::test]
    async fn test_ok_result_publishes_event() {
        let bus = EventBus::new(8);
        let mut events = bus.subscribe();
        let fanout = fanout(&bus);

        let _ = fanout.fanout(result(DetectionStatus::Ok), &request(), Surface::Api);

        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.correlation_id.as_str(), "corr-9");
        assert_eq!(event.detections[0].confidence, 0.91);
        assert_eq!(event.source, "gateway-test");
    }

    #[tokio::test]
    async fn test_failed_result_publishes_nothing() {
        let bus = EventBus::new(8);
        let mut events = bus.subscribe();
        let fanout = fanout(&bus);

        for status in [DetectionStatus::Timeout, DetectionStatus::Canceled] {
            let mut failed = result(status);
            failed.detections.clear();
            let _ = fanout.fanout(failed, &request(), Surface::Api);
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(matches!(events.try_recv(), Err(EventBusError::Empty)));
    }
}
