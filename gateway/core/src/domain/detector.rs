// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Detector
//!
//! Capability interface for the external face detection model.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Anti-corruption boundary between the gateway and whatever
//!   model is deployed (classical CV, neural network, hosted API)

use async_trait::async_trait;

use crate::domain::detection::{Detection, ImageRef};

/// Pluggable face detection capability.
///
/// Implementations must be safe for concurrent invocation; the gateway shares
/// one handle across all in-flight requests and never mutates it.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Locate faces in `image`. Implementations may apply `confidence_floor`
    /// themselves, but the orchestrator re-validates every returned detection.
    async fn detect(
        &self,
        image: &ImageRef,
        confidence_floor: f32,
    ) -> Result<Vec<Detection>, DetectorError>;

    /// Whether the detector is reachable. Drives `/readyz`.
    async fn health_check(&self) -> Result<(), DetectorError> {
        Ok(())
    }
}

/// Errors raised by a detector. Never shown to callers verbatim.
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("Image rejected: {0}")]
    InvalidImage(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Detector error: {0}")]
    Internal(String),
}
