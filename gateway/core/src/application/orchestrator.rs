// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Detection Orchestrator
//!
//! Drives one [`DetectionRequest`] through the lifecycle state machine:
//! dispatches it to the resolved [`Detector`] under the SLO budget, enforces
//! the confidence/bbox contract on whatever comes back, and produces exactly
//! one [`DetectionResult`].
//!
//! - The budget clock starts on dispatch. When it expires the detector future
//!   is dropped (cancelled); a non-cancellable detector's late answer is
//!   discarded with it.
//! - Detector errors never escape: they become `status = detector_error` with
//!   the cause logged here.
//! - No retries. Retry policy belongs to the caller.
//! - Cancellation (explicit token or the request future being dropped) ends
//!   the run as `Failed` with `status = canceled`.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Implements the detection state machine

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::detection::{Detection, DetectionRequest, DetectionResult, DetectionStatus, RequestId};
use crate::domain::detector::{Detector, DetectorError};
use crate::domain::lifecycle::{DetectionLifecycle, DetectionState};
use crate::infrastructure::detectors::DetectorRegistry;
use crate::infrastructure::telemetry;

/// Terminal outcome of one orchestration.
#[derive(Debug)]
pub struct Orchestration {
    pub result: DetectionResult,
    pub state: DetectionState,
}

pub struct DetectionOrchestrator {
    detectors: Arc<DetectorRegistry>,
    budget: Duration,
}

enum DetectorOutcome {
    Completed(Vec<Detection>),
    TimedOut,
    Failed(DetectorError),
    Canceled,
}

impl DetectionOrchestrator {
    pub fn new(detectors: Arc<DetectorRegistry>, budget: Duration) -> Self {
        Self { detectors, budget }
    }

    pub fn budget_ms(&self) -> u64 {
        self.budget.as_millis() as u64
    }

    pub async fn run(&self, request: &DetectionRequest, cancel: &CancellationToken) -> Orchestration {
        let mut run = DetectionRun::new(request.request_id().clone(), request.received_instant());
        let detector = self.detectors.resolve(request.model_hint());

        run.advance(DetectionState::Dispatched);
        debug!(
            request_id = %request.request_id(),
            image = request.image().kind(),
            budget_ms = self.budget_ms(),
            "Dispatching detection"
        );

        let outcome = self.dispatch(detector.as_ref(), request, cancel).await;

        let (status, detections) = match outcome {
            DetectorOutcome::Completed(raw) => (
                DetectionStatus::Ok,
                enforce_contract(request.request_id(), request.confidence_floor(), raw),
            ),
            DetectorOutcome::TimedOut => {
                warn!(
                    request_id = %request.request_id(),
                    budget_ms = self.budget_ms(),
                    "Detector exceeded SLO budget"
                );
                (DetectionStatus::Timeout, Vec::new())
            }
            DetectorOutcome::Failed(e) => {
                warn!(request_id = %request.request_id(), error = %e, "Detector failed");
                (DetectionStatus::DetectorError, Vec::new())
            }
            DetectorOutcome::Canceled => {
                info!(request_id = %request.request_id(), "Detection canceled by caller");
                (DetectionStatus::Canceled, Vec::new())
            }
        };

        let result = DetectionResult {
            request_id: request.request_id().clone(),
            detections,
            latency_ms: request.elapsed_ms(),
            status,
        };
        let state = run.finish(status, result.latency_ms);

        Orchestration { result, state }
    }

    async fn dispatch(
        &self,
        detector: &dyn Detector,
        request: &DetectionRequest,
        cancel: &CancellationToken,
    ) -> DetectorOutcome {
        let detect = detector.detect(request.image(), request.confidence_floor());

        tokio::select! {
            biased;
            _ = cancel.cancelled() => DetectorOutcome::Canceled,
            outcome = tokio::time::timeout(self.budget, detect) => match outcome {
                Ok(Ok(detections)) => DetectorOutcome::Completed(detections),
                Ok(Err(e)) => DetectorOutcome::Failed(e),
                Err(_) => DetectorOutcome::TimedOut,
            },
        }
    }
}

/// Drop detections that break the confidence floor or bbox invariant.
/// Order of the survivors is preserved.
fn enforce_contract(request_id: &RequestId, floor: f32, raw: Vec<Detection>) -> Vec<Detection> {
    let total = raw.len();
    let kept: Vec<Detection> = raw
        .into_iter()
        .filter(|d| d.meets_floor(floor) && d.bbox.is_well_formed())
        .collect();

    let filtered = total - kept.len();
    if filtered > 0 {
        debug!(%request_id, filtered, floor, "Filtered detections violating the result contract");
        telemetry::record_filtered(filtered);
    }
    kept
}

/// Lifecycle of a single orchestration.
///
/// If the owning future is dropped while dispatched (the caller disconnected)
/// the run is recorded as canceled on drop.
struct DetectionRun {
    request_id: RequestId,
    received: Instant,
    lifecycle: DetectionLifecycle,
}

impl DetectionRun {
    fn new(request_id: RequestId, received: Instant) -> Self {
        Self {
            request_id,
            received,
            lifecycle: DetectionLifecycle::new(),
        }
    }

    fn advance(&mut self, next: DetectionState) {
        if let Err(e) = self.lifecycle.transition(next) {
            error!(request_id = %self.request_id, error = %e, "Lifecycle violation");
        }
    }

    fn finish(&mut self, status: DetectionStatus, latency_ms: u64) -> DetectionState {
        self.advance(DetectionState::for_status(status));
        telemetry::record_request(status, latency_ms);
        debug!(
            request_id = %self.request_id,
            %status,
            latency_ms,
            state = %self.lifecycle.state(),
            "Detection finished"
        );
        self.lifecycle.state()
    }
}

impl Drop for DetectionRun {
    fn drop(&mut self) {
        if self.lifecycle.state() == DetectionState::Dispatched {
            let latency_ms = self.received.elapsed().as_millis() as u64;
            info!(request_id = %self.request_id, latency_ms, "Caller went away before detection completed");
            self.advance(DetectionState::Failed);
            telemetry::record_request(DetectionStatus::Canceled, latency_ms);
        }
    }
}
