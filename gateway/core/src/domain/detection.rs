// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Detection
//!
//! Canonical request and result shapes used regardless of calling surface.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Implements the detection data model

use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;
use uuid::Uuid;

/// Confidence floor applied when the caller does not supply one.
pub const DEFAULT_CONFIDENCE_FLOOR: f32 = 0.7;

/// Correlation identifier threading a request through logs, responses and events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Gateway-assigned identifier (UUID v4).
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Caller-supplied correlation id. Any non-empty string is accepted.
    pub fn from_caller(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the image lives. Exactly one representation per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    /// Decoded image payload
    Bytes(Bytes),
    /// Dereferenceable location
    Uri(Url),
}

impl ImageRef {
    /// Stable reference used for `FaceEvent.image_uri`.
    ///
    /// Inline payloads are content-addressed so subscribers never receive the
    /// raw bytes.
    pub fn canonical_uri(&self) -> String {
        match self {
            ImageRef::Uri(url) => url.to_string(),
            ImageRef::Bytes(bytes) => {
                let digest = Sha256::digest(bytes);
                format!("urn:facegate:sha256:{}", hex::encode(digest))
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ImageRef::Bytes(_) => "bytes",
            ImageRef::Uri(_) => "uri",
        }
    }
}

/// Canonical input. Immutable once created by the request normalizer.
#[derive(Debug, Clone)]
pub struct DetectionRequest {
    request_id: RequestId,
    image: ImageRef,
    confidence_floor: f32,
    model_hint: Option<String>,
    received_at: DateTime<Utc>,
    received_instant: Instant,
}

impl DetectionRequest {
    pub fn new(
        request_id: RequestId,
        image: ImageRef,
        confidence_floor: f32,
        model_hint: Option<String>,
    ) -> Self {
        Self {
            request_id,
            image,
            confidence_floor,
            model_hint,
            received_at: Utc::now(),
            received_instant: Instant::now(),
        }
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    pub fn confidence_floor(&self) -> f32 {
        self.confidence_floor
    }

    pub fn model_hint(&self) -> Option<&str> {
        self.model_hint.as_deref()
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn received_instant(&self) -> Instant {
        self.received_instant
    }

    /// Wall-clock milliseconds since the request was received (monotonic).
    pub fn elapsed_ms(&self) -> u64 {
        self.received_instant.elapsed().as_millis() as u64
    }
}

/// Axis-aligned face box in pixel space of the original image.
///
/// Serialized as `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// `x1 < x2` and `y1 < y2` with finite coordinates.
    pub fn is_well_formed(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2]
            .iter()
            .all(|v| v.is_finite())
            && self.x1 < self.x2
            && self.y1 < self.y2
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from([x1, y1, x2, y2]: [f32; 4]) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(bbox: BoundingBox) -> Self {
        bbox.to_array()
    }
}

/// Pixel coordinate, serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 2]", into = "[f32; 2]")]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl From<[f32; 2]> for Point {
    fn from([x, y]: [f32; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f32; 2] {
    fn from(point: Point) -> Self {
        [point.x, point.y]
    }
}

/// Named facial points (`left_eye`, `mouth`, ...). Empty when the detector
/// does not extract landmarks.
pub type Landmarks = BTreeMap<String, Point>;

/// One located face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub landmarks: Landmarks,
}

impl Detection {
    pub fn new(bbox: BoundingBox, confidence: f32) -> Self {
        Self {
            bbox,
            confidence,
            landmarks: Landmarks::new(),
        }
    }

    pub fn with_landmark(mut self, name: impl Into<String>, x: f32, y: f32) -> Self {
        self.landmarks.insert(name.into(), Point { x, y });
        self
    }

    /// Whether this detection satisfies the confidence contract for `floor`.
    pub fn meets_floor(&self, floor: f32) -> bool {
        self.confidence.is_finite() && self.confidence <= 1.0 && self.confidence >= floor
    }
}

/// Terminal outcome of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStatus {
    Ok,
    Timeout,
    DetectorError,
    InvalidRequest,
    Canceled,
}

impl DetectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionStatus::Ok => "ok",
            DetectionStatus::Timeout => "timeout",
            DetectionStatus::DetectorError => "detector_error",
            DetectionStatus::InvalidRequest => "invalid_request",
            DetectionStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for DetectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical output.
///
/// Owned by the orchestrator until it is moved into the result fan-out; it is
/// deliberately not `Clone`.
#[derive(Debug, Serialize)]
pub struct DetectionResult {
    pub request_id: RequestId,
    /// Detector's native order, never re-sorted
    pub detections: Vec<Detection>,
    pub latency_ms: u64,
    pub status: DetectionStatus,
}

impl DetectionResult {
    pub fn is_ok(&self) -> bool {
        self.status == DetectionStatus::Ok
    }
}
