// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Application Layer (`facegate-core`)
//!
//! The detection pipeline: normalize, orchestrate under the SLO budget, fan
//! the result out to the caller and the `face-events` sinks.

pub mod detection_service;
pub mod event_dispatcher;
pub mod fanout;
pub mod inflight;
pub mod normalizer;
pub mod orchestrator;

pub use detection_service::DetectionService;
pub use fanout::{Surface, SurfaceResponse};
pub use normalizer::{ImagePayload, SurfaceInput};
