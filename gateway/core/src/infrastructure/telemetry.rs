// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Telemetry - metric names and recording helpers
//
// Everything goes through the `metrics` facade; the binary installs the
// Prometheus recorder and `/metrics` renders it. Without a recorder (tests,
// embedded use) every call is a no-op.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::domain::detection::DetectionStatus;

pub const REQUESTS_TOTAL: &str = "facegate_requests_total";
pub const DETECTION_LATENCY_MS: &str = "facegate_detection_latency_ms";
pub const DETECTIONS_FILTERED_TOTAL: &str = "facegate_detections_filtered_total";
pub const EVENTS_PUBLISHED_TOTAL: &str = "facegate_events_published_total";
pub const EVENTS_DROPPED_TOTAL: &str = "facegate_events_dropped_total";
pub const EVENT_PUBLISH_RETRIES_TOTAL: &str = "facegate_event_publish_retries_total";

/// Install the global Prometheus recorder. Call once at process start.
pub fn install_prometheus_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    describe_counter!(REQUESTS_TOTAL, "Detection requests by terminal status");
    describe_histogram!(DETECTION_LATENCY_MS, "Wall-clock latency from receipt to result");
    describe_counter!(
        DETECTIONS_FILTERED_TOTAL,
        "Detections removed for violating the confidence or bbox contract"
    );
    describe_counter!(EVENTS_PUBLISHED_TOTAL, "face-events published per sink");
    describe_counter!(EVENTS_DROPPED_TOTAL, "face-events dropped after exhausting retries");
    describe_counter!(EVENT_PUBLISH_RETRIES_TOTAL, "face-events publish retries");

    Ok(handle)
}

pub fn record_request(status: DetectionStatus, latency_ms: u64) {
    counter!(REQUESTS_TOTAL, "status" => status.as_str()).increment(1);
    histogram!(DETECTION_LATENCY_MS, "status" => status.as_str()).record(latency_ms as f64);
}

pub fn record_filtered(count: usize) {
    counter!(DETECTIONS_FILTERED_TOTAL).increment(count as u64);
}

pub fn record_event_published(sink: &'static str) {
    counter!(EVENTS_PUBLISHED_TOTAL, "sink" => sink).increment(1);
}

pub fn record_event_dropped(sink: &'static str) {
    counter!(EVENTS_DROPPED_TOTAL, "sink" => sink).increment(1);
}

pub fn record_publish_retry(sink: &'static str) {
    counter!(EVENT_PUBLISH_RETRIES_TOTAL, "sink" => sink).increment(1);
}

/// Rejected at normalization: counted, but kept out of the latency histogram
/// since no detector was involved.
pub fn record_rejected() {
    counter!(REQUESTS_TOTAL, "status" => DetectionStatus::InvalidRequest.as_str()).increment(1);
}
