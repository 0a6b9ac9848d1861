// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// HTTP Detector Adapter
//
// Anti-Corruption Layer for a face detection model hosted behind HTTP.
// Forwards the image (URL or base64 bytes) and the confidence floor;
// maps the model's response back onto domain detections.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Context;

use crate::domain::detection::{BoundingBox, Detection, ImageRef, Point};
use crate::domain::detector::{Detector, DetectorError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);

pub struct HttpDetector {
    client: reqwest::Client,
    endpoint: String,
    health_timeout: Duration,
}

#[derive(Serialize)]
struct DetectRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_base64: Option<String>,
    confidence_threshold: f32,
}

#[derive(Deserialize)]
struct DetectResponse {
    faces: Vec<FaceDto>,
}

#[derive(Deserialize)]
struct FaceDto {
    bbox: [f32; 4],
    score: f32,
    #[serde(default)]
    landmarks: BTreeMap<String, [f32; 2]>,
}

impl HttpDetector {
    pub fn new(endpoint: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("Failed to build detector HTTP client")?;

        Ok(Self {
            client,
            endpoint,
            health_timeout: HEALTH_TIMEOUT,
        })
    }

    /// Upper bound for `/healthz`; readiness probes must not hang on a
    /// detector that accepts connections but never answers.
    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), path)
    }
}

impl From<FaceDto> for Detection {
    fn from(face: FaceDto) -> Self {
        Detection {
            bbox: BoundingBox::from(face.bbox),
            confidence: face.score,
            landmarks: face
                .landmarks
                .into_iter()
                .map(|(name, point)| (name, Point::from(point)))
                .collect(),
        }
    }
}

#[async_trait]
impl Detector for HttpDetector {
    async fn detect(
        &self,
        image: &ImageRef,
        confidence_floor: f32,
    ) -> Result<Vec<Detection>, DetectorError> {
        let request = match image {
            ImageRef::Uri(url) => DetectRequest {
                image_url: Some(url.to_string()),
                image_base64: None,
                confidence_threshold: confidence_floor,
            },
            ImageRef::Bytes(bytes) => DetectRequest {
                image_url: None,
                image_base64: Some(base64::engine::general_purpose::STANDARD.encode(bytes)),
                confidence_threshold: confidence_floor,
            },
        };

        let response = self
            .client
            .post(self.url("/v1/detect"))
            .json(&request)
            .send()
            .await
            .map_err(|e| DetectorError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();

            return Err(if status.is_client_error() {
                DetectorError::InvalidImage(format!("HTTP {}: {}", status, error_text))
            } else {
                DetectorError::Internal(format!("HTTP {}: {}", status, error_text))
            });
        }

        let body: DetectResponse = response
            .json()
            .await
            .map_err(|e| DetectorError::Internal(format!("Failed to parse response: {}", e)))?;

        Ok(body.faces.into_iter().map(Detection::from).collect())
    }

    async fn health_check(&self) -> Result<(), DetectorError> {
        let response = self
            .client
            .get(self.url("/healthz"))
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(|e| DetectorError::Network(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(DetectorError::Network(format!("HTTP {}", response.status())))
        }
    }
}
