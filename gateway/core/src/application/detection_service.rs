// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Detection Service
//!
//! The single entry point every surface adapter calls:
//! normalize → orchestrate → fan-out. Surfaces decode their wire format into
//! a [`SurfaceInput`] and map the returned [`GatewayError`] to their own
//! error convention; nothing else.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Wires the detection pipeline and its cancellation handles

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::application::event_dispatcher::{EventDispatcher, RetryPolicy};
use crate::application::fanout::{ResultFanout, Surface, SurfaceResponse};
use crate::application::inflight::{InflightKey, InflightRegistry};
use crate::application::normalizer::{RequestNormalizer, SurfaceInput};
use crate::application::orchestrator::DetectionOrchestrator;
use crate::domain::detection::DetectionStatus;
use crate::domain::errors::GatewayError;
use crate::domain::events::EventPublisher;
use crate::domain::gateway_config::{resolve_env_ref, GatewayConfig};
use crate::infrastructure::detectors::DetectorRegistry;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::telemetry;
use crate::infrastructure::webhook::WebhookPublisher;

pub struct DetectionService {
    normalizer: RequestNormalizer,
    orchestrator: DetectionOrchestrator,
    fanout: ResultFanout,
    inflight: InflightRegistry,
}

impl DetectionService {
    pub fn new(
        normalizer: RequestNormalizer,
        orchestrator: DetectionOrchestrator,
        fanout: ResultFanout,
    ) -> Self {
        Self {
            normalizer,
            orchestrator,
            fanout,
            inflight: InflightRegistry::new(),
        }
    }

    /// Build the pipeline from configuration. `event_bus` is always a sink;
    /// the webhook is added when `events.webhook_url` is set.
    pub fn from_config(
        config: &GatewayConfig,
        detectors: Arc<DetectorRegistry>,
        event_bus: EventBus,
    ) -> anyhow::Result<Self> {
        let mut sinks: Vec<Arc<dyn EventPublisher>> = vec![Arc::new(event_bus)];
        if let Some(url) = &config.events.webhook_url {
            let url = resolve_env_ref(url)?;
            info!(url = %url, topic = %config.events.topic, "Webhook event sink enabled");
            sinks.push(Arc::new(WebhookPublisher::new(url, config.events.topic.clone())));
        }

        let dispatcher = EventDispatcher::new(sinks, RetryPolicy::from(&config.events.retry));
        let budget = config.slo.effective_budget();
        info!(
            budget_ms = budget.as_millis() as u64,
            default_detector = detectors.default_name(),
            "Detection pipeline ready"
        );

        Ok(Self::new(
            RequestNormalizer::new(&config.request),
            DetectionOrchestrator::new(detectors, budget),
            ResultFanout::new(dispatcher, config.events.source.clone()),
        ))
    }

    pub fn inflight(&self) -> &InflightRegistry {
        &self.inflight
    }

    pub async fn detect(
        &self,
        input: SurfaceInput,
        surface: Surface,
    ) -> Result<SurfaceResponse, GatewayError> {
        self.detect_with_alias(input, surface, None).await
    }

    /// Like [`detect`](Self::detect), additionally cancellable under `alias`
    /// (MCP registers its session-scoped JSON-RPC request id here).
    pub async fn detect_with_alias(
        &self,
        input: SurfaceInput,
        surface: Surface,
        alias: Option<InflightKey>,
    ) -> Result<SurfaceResponse, GatewayError> {
        let request = self.normalizer.normalize(input).map_err(|e| {
            warn!(error = %e, "Rejected detection request");
            telemetry::record_rejected();
            e
        })?;
        let request_id = request.request_id().clone();

        let cancel = CancellationToken::new();
        let _guard = self
            .inflight
            .register(InflightKey::correlation(request_id.as_str()), cancel.clone());
        let _alias_guard = alias.map(|key| self.inflight.register(key, cancel.clone()));

        let span = info_span!("detect_face", request_id = %request_id, surface = ?surface);
        let outcome = self.orchestrator.run(&request, &cancel).instrument(span).await;

        match outcome.result.status {
            DetectionStatus::Ok => Ok(self.fanout.fanout(outcome.result, &request, surface)),
            DetectionStatus::Timeout => Err(GatewayError::DetectorTimeout {
                request_id,
                budget_ms: self.orchestrator.budget_ms(),
            }),
            DetectionStatus::DetectorError => Err(GatewayError::Detector { request_id }),
            DetectionStatus::Canceled => Err(GatewayError::Canceled { request_id }),
            // Produced by the normalizer only
            DetectionStatus::InvalidRequest => Err(GatewayError::invalid("invalid request")),
        }
    }
}
