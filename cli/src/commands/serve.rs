// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `facegate serve` - run the gateway in the foreground

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use facegate_core::domain::gateway_config::{GatewayConfigManifest, LogFormat};

use crate::logging::init_logging;
use crate::server::start_gateway;

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Bind host (overrides spec.server.host)
    #[arg(long, env = "FACEGATE_HOST")]
    pub host: Option<String>,

    /// HTTP port (overrides spec.server.http_port)
    #[arg(long, env = "FACEGATE_HTTP_PORT")]
    pub http_port: Option<u16>,

    /// gRPC port (overrides spec.server.grpc_port)
    #[arg(long, env = "FACEGATE_GRPC_PORT")]
    pub grpc_port: Option<u16>,
}

/// Logging flags from the top-level CLI; they win over the config file.
#[derive(Debug, Default, Clone)]
pub struct LogOverrides {
    pub level: Option<String>,
    pub format: Option<LogFormat>,
}

pub async fn run(
    args: ServeArgs,
    config_path: Option<PathBuf>,
    logs: LogOverrides,
) -> Result<()> {
    let mut manifest = GatewayConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;
    apply_overrides(&mut manifest, &args, &logs);

    let observability = &manifest.spec.observability;
    init_logging(&observability.log_level, observability.log_format)?;

    start_gateway(manifest).await
}

fn apply_overrides(manifest: &mut GatewayConfigManifest, args: &ServeArgs, logs: &LogOverrides) {
    let spec = &mut manifest.spec;
    if let Some(host) = &args.host {
        spec.server.host = host.clone();
    }
    if let Some(port) = args.http_port {
        spec.server.http_port = port;
    }
    if let Some(port) = args.grpc_port {
        spec.server.grpc_port = port;
    }
    if let Some(level) = &logs.level {
        spec.observability.log_level = level.clone();
    }
    if let Some(format) = logs.format {
        spec.observability.log_format = format;
    }
}
