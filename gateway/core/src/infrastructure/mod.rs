// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Infrastructure Layer (`facegate-core`)
//!
//! Adapters for the outside world: detector deployments, `face-events`
//! sinks, and the metrics recorder.

pub mod detectors;
pub mod event_bus;
pub mod telemetry;
pub mod webhook;
