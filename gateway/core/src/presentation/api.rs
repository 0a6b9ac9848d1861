// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! HTTP Surface
//!
//! Axum router for the gateway: the `/detect_face` endpoint, its cancel
//! handle, liveness/readiness probes, Prometheus metrics, the `face-events`
//! SSE stream and the MCP endpoint.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{Stream, StreamExt};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::application::fanout::{Surface, SurfaceResponse};
use crate::application::inflight::InflightKey;
use crate::application::normalizer::{ImagePayload, SurfaceInput};
use crate::application::DetectionService;
use crate::domain::errors::GatewayError;
use crate::domain::events::FaceEvent;
use crate::infrastructure::detectors::DetectorRegistry;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::telemetry;
use crate::presentation::mcp::{self, McpSurface};

pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Base64 inflates by 4/3; leave room for the JSON envelope.
fn body_limit(max_image_bytes: usize) -> usize {
    max_image_bytes / 3 * 4 + 64 * 1024
}

pub struct AppState {
    pub service: Arc<DetectionService>,
    pub event_bus: EventBus,
    pub detectors: Arc<DetectorRegistry>,
    pub mcp: McpSurface,
    pub metrics: Option<PrometheusHandle>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        service: Arc<DetectionService>,
        event_bus: EventBus,
        detectors: Arc<DetectorRegistry>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            service,
            event_bus,
            detectors,
            mcp: McpSurface::new()?,
            metrics: None,
            start_time: Instant::now(),
        })
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

pub fn app(state: AppState, max_image_bytes: usize) -> Router {
    Router::new()
        .route("/detect_face", post(detect_face_handler))
        .route("/detect_face/{correlation_id}/cancel", post(cancel_handler))
        .route("/healthz", get(health_handler))
        .route("/readyz", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .route("/events", get(events_handler))
        .route("/mcp", post(mcp::handle).delete(mcp::terminate))
        // Oversized bodies surface as extractor rejections, rendered below
        .layer(DefaultBodyLimit::max(body_limit(max_image_bytes)))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

// ============================================================================
// Errors
// ============================================================================

/// HTTP rendering of a [`GatewayError`].
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::DetectorTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Detector { .. } => StatusCode::BAD_GATEWAY,
            // 499 Client Closed Request
            GatewayError::Canceled { .. } => {
                StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.0.error_code();
        let message = self.0.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, error_code, message = %message, "Request error");
        } else {
            debug!(status = %status, error_code, message = %message, "Request rejected");
        }

        let mut body = json!({
            "error_code": error_code,
            "message": message,
            "status": self.0.status(),
        });
        let mut headers = HeaderMap::new();
        if let Some(request_id) = self.0.request_id() {
            body["request_id"] = json!(request_id);
            if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
                headers.insert(CORRELATION_HEADER, value);
            }
        }

        (status, headers, Json(body)).into_response()
    }
}

// ============================================================================
// Detection
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ImageBody {
    pub url: Option<String>,
    /// Base64 (optionally a `data:` URI)
    pub bytes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DetectOptions {
    pub model: Option<String>,
    pub confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct DetectFaceBody {
    #[serde(default)]
    pub image: ImageBody,
    #[serde(default)]
    pub options: DetectOptions,
    pub correlation_id: Option<String>,
}

impl DetectFaceBody {
    fn into_input(self, header_correlation: Option<String>) -> SurfaceInput {
        SurfaceInput {
            image_url: self.image.url,
            image_bytes: self.image.bytes.map(ImagePayload::Base64),
            confidence: self.options.confidence,
            model_hint: self.options.model,
            correlation_id: self.correlation_id.or(header_correlation),
        }
    }
}

async fn detect_face_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<DetectFaceBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = payload.map_err(|rejection| {
        telemetry::record_rejected();
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            GatewayError::invalid("image payload too large")
        } else {
            GatewayError::invalid(format!("malformed request body: {}", rejection.body_text()))
        }
    })?;

    let header_correlation = headers
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let response = state
        .service
        .detect(body.into_input(header_correlation), Surface::Api)
        .await?;

    let mut response_headers = HeaderMap::new();
    if let SurfaceResponse::Api(api) = &response {
        if let Ok(value) = HeaderValue::from_str(api.request_id.as_str()) {
            response_headers.insert(CORRELATION_HEADER, value);
        }
    }

    Ok((StatusCode::OK, response_headers, Json(response)).into_response())
}

async fn cancel_handler(
    State(state): State<Arc<AppState>>,
    Path(correlation_id): Path<String>,
) -> Response {
    let cancelled = state
        .service
        .inflight()
        .cancel(&InflightKey::correlation(correlation_id.as_str()));
    if cancelled == 0 {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error_code": "NOT_FOUND",
                "message": format!("no inflight request with correlation id '{}'", correlation_id),
            })),
        )
            .into_response();
    }

    (
        StatusCode::ACCEPTED,
        Json(json!({
            "correlation_id": correlation_id,
            "cancelled": cancelled,
        })),
    )
        .into_response()
}

// ============================================================================
// Probes and metrics
// ============================================================================

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "uptime_seconds": state.start_time.elapsed().as_secs(),
    }))
}

/// Ready when the default detector answers its health check.
async fn ready_handler(State(state): State<Arc<AppState>>) -> Response {
    let detector = state.detectors.default_name().to_string();
    match state.detectors.check_ready().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ready", "detector": detector })),
        )
            .into_response(),
        Err(e) => {
            warn!(detector = %detector, error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unavailable",
                    "detector": detector,
                    "error": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

// ============================================================================
// face-events SSE
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub correlation_id: Option<String>,
}

async fn events_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = state
        .event_bus
        .stream(query.correlation_id)
        .filter_map(|event| async move { sse_event(&event).map(Ok::<_, Infallible>) });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn sse_event(event: &FaceEvent) -> Option<Event> {
    let sse = Event::default().event("face-event");
    // SSE ids cannot carry line breaks or NUL; the payload still has the id
    let sse = match sse_id(event.correlation_id.as_str()) {
        Some(id) => sse.id(id),
        None => sse,
    };
    match sse.json_data(event) {
        Ok(sse) => Some(sse),
        Err(e) => {
            warn!(correlation_id = %event.correlation_id, error = %e, "Failed to encode face event");
            None
        }
    }
}

fn sse_id(correlation_id: &str) -> Option<&str> {
    let printable = !correlation_id.contains(|c: char| matches!(c, '\n' | '\r' | '\0'));
    printable.then_some(correlation_id)
}
