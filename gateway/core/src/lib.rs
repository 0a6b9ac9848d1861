// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Lib
//!
//! Face detection gateway core: one detection capability exposed through
//! HTTP/gRPC, an MCP tool, and the `face-events` stream.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Wires the domain, application, infrastructure and
//!   presentation layers

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
