// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::detection::{BoundingBox, DetectionRequest, DetectionResult, RequestId};

/// Detection as carried on `face-events`: landmarks are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDetection {
    pub bbox: BoundingBox,
    pub confidence: f32,
}

/// Immutable projection of a successful detection, published on the
/// `face-events` topic. Subscribers dedupe on `correlation_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceEvent {
    pub source: String,
    pub image_uri: String,
    pub detections: Vec<EventDetection>,
    /// RFC 3339
    pub created_at: DateTime<Utc>,
    pub correlation_id: RequestId,
}

impl FaceEvent {
    /// Returns `None` unless `result.status == ok`.
    pub fn project(
        result: &DetectionResult,
        request: &DetectionRequest,
        source: &str,
    ) -> Option<Self> {
        if !result.is_ok() {
            return None;
        }

        Some(Self {
            source: source.to_string(),
            image_uri: request.image().canonical_uri(),
            detections: result
                .detections
                .iter()
                .map(|d| EventDetection {
                    bbox: d.bbox,
                    confidence: d.confidence,
                })
                .collect(),
            created_at: Utc::now(),
            correlation_id: result.request_id.clone(),
        })
    }
}

/// Sink for the `face-events` topic.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Short sink label for logs and metrics
    fn name(&self) -> &'static str;

    async fn publish(&self, event: &FaceEvent) -> Result<(), PublishError>;
}

/// Event-path failure. Never surfaced to the calling surface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    /// Worth retrying (network blip, 5xx, overloaded broker)
    #[error("Transient publish failure: {0}")]
    Transient(String),

    /// Retrying cannot help (rejected payload, closed channel)
    #[error("Permanent publish failure: {0}")]
    Permanent(String),
}

impl PublishError {
    pub fn is_transient(&self) -> bool {
        matches!(self, PublishError::Transient(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::detection::{Detection, DetectionStatus, ImageRef};
    use url::Url;

    fn request() -> DetectionRequest {
        DetectionRequest::new(
            RequestId::from_caller("corr-42").unwrap(),
            ImageRef::Uri(Url::parse("https://cdn.example.com/face.png").unwrap()),
            0.7,
            None,
        )
    }

    #[test]
    fn test_projection_drops_landmarks() {
        let request = request();
        let result = DetectionResult {
            request_id: request.request_id().clone(),
            detections: vec![Detection::new(BoundingBox::new(1.0, 2.0, 3.0, 4.0), 0.9)
                .with_landmark("mouth", 2.0, 3.0)],
            latency_ms: 12,
            status: DetectionStatus::Ok,
        };

        let event = FaceEvent::project(&result, &request, "gateway-test").unwrap();
        assert_eq!(event.correlation_id.as_str(), "corr-42");
        assert_eq!(event.image_uri, "https://cdn.example.com/face.png");
        assert_eq!(event.source, "gateway-test");

        let json = serde_json::to_value(&event).unwrap();
        assert!(json["detections"][0].get("landmarks").is_none());
        assert_eq!(json["detections"][0]["bbox"], serde_json::json!([1.0, 2.0, 3.0, 4.0]));
        assert!(json["created_at"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_no_projection_for_failed_results() {
        let request = request();
        for status in [
            DetectionStatus::Timeout,
            DetectionStatus::DetectorError,
            DetectionStatus::Canceled,
            DetectionStatus::InvalidRequest,
        ] {
            let result = DetectionResult {
                request_id: request.request_id().clone(),
                detections: vec![],
                latency_ms: 0,
                status,
            };
            assert!(FaceEvent::project(&result, &request, "gateway-test").is_none());
        }
    }
}
