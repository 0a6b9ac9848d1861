// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Layer (`facegate-core`)
//!
//! Canonical request/result model, the `Detector` capability interface and
//! the error taxonomy. Nothing in this layer knows which surface a request
//! arrived on.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`detection`] | `DetectionRequest`, `Detection`, `DetectionResult` |
//! | [`lifecycle`] | `Pending → Dispatched → {Completed, TimedOut, Failed}` |
//! | [`detector`] | Pluggable detection capability |
//! | [`events`] | `FaceEvent` projection published on `face-events` |
//! | [`errors`] | `GatewayError` taxonomy |
//! | [`gateway_config`] | YAML deployment manifest |

pub mod detection;
pub mod detector;
pub mod errors;
pub mod events;
pub mod gateway_config;
pub mod lifecycle;
