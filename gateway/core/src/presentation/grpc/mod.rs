// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! gRPC surface (`facegate.v1.FaceDetection`)

pub mod server;
