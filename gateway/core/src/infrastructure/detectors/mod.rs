// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Detector Infrastructure - Anti-Corruption Layer Implementations
//
// Each adapter translates between the domain `Detector` capability and one
// concrete model deployment. The registry maps variant names (model hints)
// to adapters.

pub mod http;
pub mod registry;

pub use http::HttpDetector;
pub use registry::DetectorRegistry;
