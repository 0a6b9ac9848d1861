// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Errors
//!
//! Caller-visible error taxonomy. Every failure a surface can report is one of
//! these; detector causes are logged at the orchestrator boundary and never
//! carried here.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Implements the gateway error taxonomy

use crate::domain::detection::{DetectionStatus, RequestId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Malformed or ambiguous input. Never retried by the gateway.
    #[error("{0}")]
    InvalidRequest(String),

    /// SLO budget exceeded before the detector answered.
    #[error("detection exceeded the {budget_ms}ms budget")]
    DetectorTimeout { request_id: RequestId, budget_ms: u64 },

    /// The detector rejected the input or failed internally.
    #[error("face detector failed to process the image")]
    Detector { request_id: RequestId },

    /// The caller went away before a result was produced.
    #[error("request canceled before completion")]
    Canceled { request_id: RequestId },
}

impl GatewayError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn status(&self) -> DetectionStatus {
        match self {
            GatewayError::InvalidRequest(_) => DetectionStatus::InvalidRequest,
            GatewayError::DetectorTimeout { .. } => DetectionStatus::Timeout,
            GatewayError::Detector { .. } => DetectionStatus::DetectorError,
            GatewayError::Canceled { .. } => DetectionStatus::Canceled,
        }
    }

    /// Stable machine-readable code for error bodies.
    pub fn error_code(&self) -> &'static str {
        match self {
            GatewayError::InvalidRequest(_) => "INVALID_REQUEST",
            GatewayError::DetectorTimeout { .. } => "DETECTOR_TIMEOUT",
            GatewayError::Detector { .. } => "DETECTOR_ERROR",
            GatewayError::Canceled { .. } => "CANCELED",
        }
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        match self {
            GatewayError::InvalidRequest(_) => None,
            GatewayError::DetectorTimeout { request_id, .. }
            | GatewayError::Detector { request_id }
            | GatewayError::Canceled { request_id } => Some(request_id),
        }
    }
}
