// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`facegate-core`)
//!
//! Surface adapters that decode a wire format, call
//! [`DetectionService`](crate::application::DetectionService) and encode the
//! answer. **No business logic lives here**; validation is owned by the
//! request normalizer.
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`api`] | HTTP/SSE (Axum) | `POST /detect_face`, probes, metrics, `face-events` SSE |
//! | [`mcp`] | JSON-RPC over HTTP | `detect_face` MCP tool |
//! | [`grpc`] | gRPC (Tonic) | `facegate.v1.FaceDetection` |

pub mod api;
pub mod grpc;
pub mod mcp;
