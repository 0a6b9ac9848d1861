// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! MCP Surface
//!
//! Minimal Model Context Protocol server (JSON-RPC 2.0 over `POST /mcp`)
//! exposing a single tool, `detect_face`. Tool arguments are validated
//! against the published input schema before they reach the pipeline;
//! failures map to `-32602` like any other invalid request.
//!
//! Supported methods: `initialize`, `ping`, `tools/list`, `tools/call`, and
//! the `notifications/cancelled` notification (cancels the matching call).
//!
//! `initialize` opens a session and returns its id in `Mcp-Session-Id`.
//! Calls carrying that header are cancellable by `notifications/cancelled`
//! from the same session only; calls without one are not cancellable.
//! `DELETE /mcp` closes a session.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::fanout::{McpDetectOutput, Surface};
use crate::application::inflight::InflightKey;
use crate::application::normalizer::SurfaceInput;
use crate::domain::errors::GatewayError;
use crate::infrastructure::telemetry;
use crate::presentation::api::AppState;

pub const PROTOCOL_VERSION: &str = "2025-06-18";
pub const TOOL_NAME: &str = "detect_face";
pub const SESSION_HEADER: &str = "mcp-session-id";

// JSON-RPC 2.0 error codes
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
// Server-defined range
pub const DETECTOR_TIMEOUT: i64 = -32001;
pub const REQUEST_CANCELLED: i64 = -32800;

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    /// Absent for notifications
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Value, code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data,
            }),
        }
    }

    fn from_gateway_error(id: Value, err: &GatewayError) -> Self {
        let code = match err {
            GatewayError::InvalidRequest(_) => INVALID_PARAMS,
            GatewayError::DetectorTimeout { .. } => DETECTOR_TIMEOUT,
            GatewayError::Detector { .. } => INTERNAL_ERROR,
            GatewayError::Canceled { .. } => REQUEST_CANCELLED,
        };
        let mut data = json!({
            "error_code": err.error_code(),
            "status": err.status(),
        });
        if let Some(request_id) = err.request_id() {
            data["request_id"] = json!(request_id);
        }
        Self::failure(id, code, err.to_string(), Some(data))
    }
}

/// Tool metadata, the compiled argument validator and open sessions.
pub struct McpSurface {
    input_schema: Value,
    output_schema: Value,
    validator: jsonschema::Validator,
    sessions: DashMap<String, DateTime<Utc>>,
}

impl McpSurface {
    pub fn new() -> anyhow::Result<Self> {
        let input_schema = detect_face_input_schema();
        let output_schema = serde_json::to_value(schemars::schema_for!(McpDetectOutput))?;
        let validator = jsonschema::validator_for(&input_schema)
            .map_err(|e| anyhow::anyhow!("Invalid detect_face input schema: {}", e))?;

        Ok(Self {
            input_schema,
            output_schema,
            validator,
            sessions: DashMap::new(),
        })
    }

    pub fn open_session(&self) -> String {
        let id = Uuid::new_v4().to_string();
        self.sessions.insert(id.clone(), Utc::now());
        id
    }

    pub fn has_session(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn close_session(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    pub fn tool_descriptor(&self) -> Value {
        json!({
            "name": TOOL_NAME,
            "title": "Detect faces",
            "description": "Locate human faces in an image. Returns bounding boxes \
                            [x1, y1, x2, y2] in pixels with a confidence score and \
                            optional facial landmarks.",
            "inputSchema": self.input_schema,
            "outputSchema": self.output_schema,
        })
    }

    /// Schema violations as human-readable strings; empty when valid.
    pub fn validate_arguments(&self, arguments: &Value) -> Vec<String> {
        self.validator
            .iter_errors(arguments)
            .map(|e| e.to_string())
            .collect()
    }
}

fn detect_face_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "image_url": {
                "type": "string",
                "description": "URL of the image to analyze"
            },
            "confidence": {
                "type": "number",
                "minimum": 0,
                "maximum": 1,
                "description": "Minimum detection confidence (default 0.7)"
            }
        },
        "required": ["image_url"],
        "additionalProperties": false
    })
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct DetectFaceArguments {
    image_url: String,
    confidence: Option<f64>,
}

/// Cancellation key of an MCP call, shared with `notifications/cancelled`.
/// The id is kept in its JSON form so `1` and `"1"` stay distinct.
pub fn inflight_key(session: &str, id: &Value) -> InflightKey {
    InflightKey::mcp_call(session, id.to_string())
}

fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub async fn handle(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            return (
                rejection.status(),
                Json(JsonRpcResponse::failure(
                    Value::Null,
                    INVALID_REQUEST,
                    rejection.body_text(),
                    None,
                )),
            )
                .into_response()
        }
    };

    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return Json(JsonRpcResponse::failure(
                Value::Null,
                PARSE_ERROR,
                format!("Parse error: {}", e),
                None,
            ))
            .into_response()
        }
    };

    if request.jsonrpc != "2.0" {
        let id = request.id.unwrap_or(Value::Null);
        return Json(JsonRpcResponse::failure(
            id,
            INVALID_REQUEST,
            "jsonrpc must be \"2.0\"",
            None,
        ))
        .into_response();
    }

    if request.method == "initialize" {
        return initialize(&state, request.id.unwrap_or(Value::Null));
    }

    let session = session_id(&headers);
    if let Some(session) = &session {
        if !state.mcp.has_session(session) {
            debug!(session = %session, "Request for unknown MCP session");
            return (
                StatusCode::NOT_FOUND,
                Json(JsonRpcResponse::failure(
                    request.id.unwrap_or(Value::Null),
                    INVALID_REQUEST,
                    "Unknown MCP session",
                    None,
                )),
            )
                .into_response();
        }
    }

    let Some(id) = request.id.clone() else {
        handle_notification(&state, session.as_deref(), &request);
        return StatusCode::ACCEPTED.into_response();
    };

    debug!(method = %request.method, id = %id, "MCP request");
    let response = match request.method.as_str() {
        "ping" => JsonRpcResponse::success(id, json!({})),
        "tools/list" => JsonRpcResponse::success(
            id,
            json!({ "tools": [state.mcp.tool_descriptor()] }),
        ),
        "tools/call" => call_tool(&state, session.as_deref(), id, request.params).await,
        other => JsonRpcResponse::failure(
            id,
            METHOD_NOT_FOUND,
            format!("Method not found: {}", other),
            None,
        ),
    };

    Json(response).into_response()
}

/// `DELETE /mcp`: close the session named by `Mcp-Session-Id`.
pub async fn terminate(State(state): State<Arc<AppState>>, headers: HeaderMap) -> StatusCode {
    match session_id(&headers) {
        Some(session) if state.mcp.close_session(&session) => {
            info!(session = %session, "MCP session closed");
            StatusCode::NO_CONTENT
        }
        Some(_) => StatusCode::NOT_FOUND,
        None => StatusCode::BAD_REQUEST,
    }
}

fn initialize(state: &AppState, id: Value) -> Response {
    let session = state.mcp.open_session();
    info!(session = %session, "MCP session opened");

    let response = JsonRpcResponse::success(
        id,
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": {
                "name": "facegate",
                "version": env!("CARGO_PKG_VERSION"),
            },
        }),
    );

    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&session) {
        headers.insert(SESSION_HEADER, value);
    }
    (headers, Json(response)).into_response()
}

fn handle_notification(state: &AppState, session: Option<&str>, request: &JsonRpcRequest) {
    match request.method.as_str() {
        "notifications/cancelled" => {
            let Some(request_id) = request.params.get("requestId") else {
                debug!("notifications/cancelled without requestId");
                return;
            };
            let Some(session) = session else {
                debug!("notifications/cancelled outside a session");
                return;
            };
            let key = inflight_key(session, request_id);
            let cancelled = state.service.inflight().cancel(&key);
            info!(
                key = %key,
                cancelled,
                reason = request.params.get("reason").and_then(serde_json::Value::as_str).unwrap_or(""),
                "MCP call cancelled by client"
            );
        }
        other => debug!(method = %other, "Ignoring MCP notification"),
    }
}

async fn call_tool(
    state: &AppState,
    session: Option<&str>,
    id: Value,
    params: Value,
) -> JsonRpcResponse {
    let params: ToolCallParams = match serde_json::from_value(params) {
        Ok(params) => params,
        Err(e) => {
            return JsonRpcResponse::failure(
                id,
                INVALID_PARAMS,
                format!("Invalid tools/call params: {}", e),
                None,
            )
        }
    };

    if params.name != TOOL_NAME {
        return JsonRpcResponse::failure(
            id,
            INVALID_PARAMS,
            format!("Unknown tool: {}", params.name),
            None,
        );
    }

    let violations = state.mcp.validate_arguments(&params.arguments);
    if !violations.is_empty() {
        telemetry::record_rejected();
        let err = GatewayError::invalid("arguments do not match the detect_face input schema");
        let mut response = JsonRpcResponse::from_gateway_error(id, &err);
        if let Some(error) = response.error.as_mut() {
            if let Some(data) = error.data.as_mut() {
                data["violations"] = json!(violations);
            }
        }
        return response;
    }

    let arguments: DetectFaceArguments = match serde_json::from_value(params.arguments) {
        Ok(arguments) => arguments,
        Err(e) => {
            telemetry::record_rejected();
            let err = GatewayError::invalid(format!("invalid arguments: {}", e));
            return JsonRpcResponse::from_gateway_error(id, &err);
        }
    };

    let mut input = SurfaceInput::from_url(arguments.image_url);
    input.confidence = arguments.confidence;

    let outcome = state
        .service
        .detect_with_alias(input, Surface::Mcp, session.map(|s| inflight_key(s, &id)))
        .await;

    match outcome {
        Ok(output) => {
            let structured = match serde_json::to_value(&output) {
                Ok(value) => value,
                Err(e) => {
                    return JsonRpcResponse::failure(id, INTERNAL_ERROR, e.to_string(), None)
                }
            };
            JsonRpcResponse::success(
                id,
                json!({
                    "content": [{ "type": "text", "text": structured.to_string() }],
                    "structuredContent": structured,
                    "isError": false,
                }),
            )
        }
        Err(err) => JsonRpcResponse::from_gateway_error(id, &err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_validation() {
        let surface = McpSurface::new().unwrap();

        assert!(surface
            .validate_arguments(&json!({ "image_url": "https://example.com/a.jpg" }))
            .is_empty());
        assert!(surface
            .validate_arguments(&json!({ "image_url": "https://example.com/a.jpg", "confidence": 0.5 }))
            .is_empty());

        assert!(!surface.validate_arguments(&json!({})).is_empty());
        assert!(!surface
            .validate_arguments(&json!({ "image_url": "https://example.com/a.jpg", "confidence": 1.5 }))
            .is_empty());
        assert!(!surface.validate_arguments(&json!({ "image_url": 42 })).is_empty());
    }

    #[test]
    fn test_tool_descriptor_publishes_both_schemas() {
        let surface = McpSurface::new().unwrap();
        let tool = surface.tool_descriptor();

        assert_eq!(tool["name"], TOOL_NAME);
        assert_eq!(tool["inputSchema"]["required"], json!(["image_url"]));
        let output = tool["outputSchema"].to_string();
        assert!(output.contains("latency_ms"));
        assert!(output.contains("detections"));
    }

    #[test]
    fn test_inflight_key_is_session_scoped() {
        assert_eq!(inflight_key("s1", &json!(7)), InflightKey::mcp_call("s1", "7"));
        assert_ne!(inflight_key("s1", &json!(7)), inflight_key("s2", &json!(7)));
        assert_ne!(inflight_key("s1", &json!(7)), inflight_key("s1", &json!("7")));
    }

    #[test]
    fn test_session_lifecycle() {
        let surface = McpSurface::new().unwrap();
        let session = surface.open_session();

        assert!(surface.has_session(&session));
        assert_ne!(surface.open_session(), session);
        assert!(surface.close_session(&session));
        assert!(!surface.has_session(&session));
        assert!(!surface.close_session(&session));
    }

    #[test]
    fn test_error_code_mapping() {
        let id = json!(1);
        let timeout = JsonRpcResponse::from_gateway_error(
            id.clone(),
            &GatewayError::DetectorTimeout {
                request_id: crate::domain::detection::RequestId::new(),
                budget_ms: 200,
            },
        );
        assert_eq!(timeout.error.unwrap().code, DETECTOR_TIMEOUT);

        let invalid = JsonRpcResponse::from_gateway_error(id, &GatewayError::invalid("nope"));
        let error = invalid.error.unwrap();
        assert_eq!(error.code, INVALID_PARAMS);
        assert_eq!(error.data.unwrap()["error_code"], "INVALID_REQUEST");
    }
}
