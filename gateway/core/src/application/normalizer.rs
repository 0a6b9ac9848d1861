// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Request Normalizer
//!
//! Converts the decoded input of any surface into one canonical
//! [`DetectionRequest`]. All input validation lives here; surface adapters
//! only decode their wire format into [`SurfaceInput`].
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Pure translation, no side effects beyond request construction

use base64::Engine;
use bytes::Bytes;
use url::Url;

use crate::domain::detection::{DetectionRequest, ImageRef, RequestId, DEFAULT_CONFIDENCE_FLOOR};
use crate::domain::errors::GatewayError;
use crate::domain::gateway_config::RequestConfig;

/// Image payload as it arrived on the wire.
#[derive(Debug, Clone)]
pub enum ImagePayload {
    /// Already-binary payload (gRPC `bytes`)
    Raw(Bytes),
    /// Base64 text (HTTP JSON), optionally as a `data:` URI
    Base64(String),
}

/// Surface-neutral shape every adapter decodes into.
#[derive(Debug, Clone, Default)]
pub struct SurfaceInput {
    pub image_url: Option<String>,
    pub image_bytes: Option<ImagePayload>,
    pub confidence: Option<f64>,
    pub model_hint: Option<String>,
    pub correlation_id: Option<String>,
}

impl SurfaceInput {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            image_url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn from_base64(data: impl Into<String>) -> Self {
        Self {
            image_bytes: Some(ImagePayload::Base64(data.into())),
            ..Default::default()
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_model_hint(mut self, model: impl Into<String>) -> Self {
        self.model_hint = Some(model.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct RequestNormalizer {
    default_confidence: f32,
    max_image_bytes: usize,
}

impl RequestNormalizer {
    pub fn new(config: &RequestConfig) -> Self {
        Self {
            default_confidence: config.default_confidence,
            max_image_bytes: config.max_image_bytes,
        }
    }

    pub fn normalize(&self, input: SurfaceInput) -> Result<DetectionRequest, GatewayError> {
        let image = match (input.image_url, input.image_bytes) {
            (Some(url), None) => ImageRef::Uri(Self::parse_url(&url)?),
            (None, Some(payload)) => ImageRef::Bytes(self.decode_payload(payload)?),
            _ => return Err(GatewayError::invalid("ambiguous image reference")),
        };

        let confidence_floor = match input.confidence {
            Some(c) if (0.0..=1.0).contains(&c) => c as f32,
            Some(_) => return Err(GatewayError::invalid("confidence out of range")),
            None => self.default_confidence,
        };

        let request_id = input
            .correlation_id
            .and_then(RequestId::from_caller)
            .unwrap_or_default();

        let model_hint = input
            .model_hint
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());

        Ok(DetectionRequest::new(
            request_id,
            image,
            confidence_floor,
            model_hint,
        ))
    }

    /// Only `http` and `https` images are forwarded to a detector.
    fn parse_url(raw: &str) -> Result<Url, GatewayError> {
        let url = Url::parse(raw.trim()).map_err(|_| GatewayError::invalid("invalid image url"))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            _ => Err(GatewayError::invalid("unsupported image url scheme")),
        }
    }

    fn decode_payload(&self, payload: ImagePayload) -> Result<Bytes, GatewayError> {
        let bytes = match payload {
            ImagePayload::Raw(bytes) => bytes,
            ImagePayload::Base64(text) => {
                let encoded = strip_data_uri(text.trim());
                // Reject before decoding when the encoded form is already too large
                if encoded.len() / 4 * 3 > self.max_image_bytes + 3 {
                    return Err(GatewayError::invalid("image payload too large"));
                }
                base64::engine::general_purpose::STANDARD
                    .decode(encoded)
                    .map(Bytes::from)
                    .map_err(|_| GatewayError::invalid("invalid base64 image payload"))?
            }
        };

        if bytes.is_empty() {
            return Err(GatewayError::invalid("empty image payload"));
        }
        if bytes.len() > self.max_image_bytes {
            return Err(GatewayError::invalid("image payload too large"));
        }
        Ok(bytes)
    }
}

impl Default for RequestNormalizer {
    fn default() -> Self {
        Self {
            default_confidence: DEFAULT_CONFIDENCE_FLOOR,
            max_image_bytes: RequestConfig::default().max_image_bytes,
        }
    }
}

fn strip_data_uri(text: &str) -> &str {
    match (text.starts_with("data:"), text.find(";base64,")) {
        (true, Some(idx)) => &text[idx + ";base64,".len()..],
        _ => text,
    }
}
