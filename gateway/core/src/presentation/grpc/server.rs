// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! gRPC Server Implementation for the face detection gateway
//! Exposes DetectFace, the gRPC twin of `POST /detect_face`

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::{Request, Response, Status};

use crate::application::fanout::{Surface, SurfaceResponse};
use crate::application::normalizer::{ImagePayload, SurfaceInput};
use crate::application::DetectionService;
use crate::domain::detection as domain;
use crate::domain::errors::GatewayError;

// Generated protobuf code
pub mod facegate_v1 {
    tonic::include_proto!("facegate.v1");
}

use facegate_v1::face_detection_server::{FaceDetection, FaceDetectionServer};
use facegate_v1::*;

const CORRELATION_METADATA: &str = "x-correlation-id";

/// Implementation of the FaceDetection gRPC service
pub struct FaceDetectionService {
    service: Arc<DetectionService>,
}

impl FaceDetectionService {
    pub fn new(service: Arc<DetectionService>) -> Self {
        Self { service }
    }

    /// Create a gRPC server instance
    pub fn into_server(self) -> FaceDetectionServer<Self> {
        FaceDetectionServer::new(self)
    }
}

#[tonic::async_trait]
impl FaceDetection for FaceDetectionService {
    async fn detect_face(
        &self,
        request: Request<DetectFaceRequest>,
    ) -> Result<Response<DetectFaceResponse>, Status> {
        let metadata_correlation = request
            .metadata()
            .get(CORRELATION_METADATA)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let req = request.into_inner();

        let input = into_surface_input(req, metadata_correlation);
        let response = self
            .service
            .detect(input, Surface::Api)
            .await
            .map_err(to_status)?;

        let SurfaceResponse::Api(api) = response else {
            return Err(Status::internal("unexpected response shape"));
        };

        let mut response = Response::new(DetectFaceResponse {
            detections: api.detections.iter().map(to_proto_detection).collect(),
            latency_ms: api.latency_ms,
            request_id: api.request_id.to_string(),
        });
        if let Ok(value) = api.request_id.as_str().parse::<MetadataValue<Ascii>>() {
            response.metadata_mut().insert(CORRELATION_METADATA, value);
        }
        Ok(response)
    }
}

fn into_surface_input(req: DetectFaceRequest, metadata_correlation: Option<String>) -> SurfaceInput {
    let (image_url, image_bytes) = match req.image {
        Some(detect_face_request::Image::Url(url)) => (Some(url), None),
        Some(detect_face_request::Image::Data(data)) => {
            (None, Some(ImagePayload::Raw(Bytes::from(data))))
        }
        None => (None, None),
    };

    SurfaceInput {
        image_url,
        image_bytes,
        confidence: req.confidence.map(f64::from),
        model_hint: req.model,
        correlation_id: req.correlation_id.or(metadata_correlation),
    }
}

fn to_proto_detection(d: &domain::Detection) -> Detection {
    Detection {
        bbox: Some(BoundingBox {
            x1: d.bbox.x1,
            y1: d.bbox.y1,
            x2: d.bbox.x2,
            y2: d.bbox.y2,
        }),
        confidence: d.confidence,
        landmarks: d
            .landmarks
            .iter()
            .map(|(name, p)| (name.clone(), Point { x: p.x, y: p.y }))
            .collect(),
    }
}

/// Map the gateway taxonomy onto gRPC status codes.
pub fn to_status(err: GatewayError) -> Status {
    let mut status = match &err {
        GatewayError::InvalidRequest(msg) => Status::invalid_argument(msg.clone()),
        GatewayError::DetectorTimeout { .. } => Status::deadline_exceeded(err.to_string()),
        GatewayError::Detector { .. } => Status::internal(err.to_string()),
        GatewayError::Canceled { .. } => Status::cancelled(err.to_string()),
    };
    if let Some(request_id) = err.request_id() {
        if let Ok(value) = request_id.as_str().parse::<MetadataValue<Ascii>>() {
            status.metadata_mut().insert(CORRELATION_METADATA, value);
        }
    }
    status
}

/// Start the gRPC server, stopping when `shutdown` resolves
pub async fn start_grpc_server(
    addr: std::net::SocketAddr,
    service: Arc<DetectionService>,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    let server = FaceDetectionService::new(service).into_server();

    tracing::info!("Starting facegate gRPC server on {}", addr);

    tonic::transport::Server::builder()
        .add_service(server)
        .serve_with_shutdown(addr, shutdown)
        .await?;

    Ok(())
}
