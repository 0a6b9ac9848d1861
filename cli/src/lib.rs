// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! facegate CLI library - exposes testable components
//!
//! # Architecture
//!
//! - **Layer:** Interface / Presentation Layer
//! - **Purpose:** Process wiring (logging, servers) and CLI commands

pub mod commands;
pub mod logging;
pub mod server;
