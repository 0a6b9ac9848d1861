// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Build Script for facegate-core
//!
//! Compiles the `facegate.v1` Protocol Buffer definitions for the gRPC
//! detection surface. Generated code is placed in `OUT_DIR` and included via
//! `tonic::include_proto!` in `src/presentation/grpc/server.rs`.
//!
//! `protoc` is vendored via `protoc-bin-vendored`.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Point PROTOC at the vendored binary so builds do not need a system protoc
    std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path().unwrap());

    tonic_prost_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/face_detection.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/face_detection.proto");

    Ok(())
}
