// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Gateway process: HTTP and gRPC servers sharing one detection pipeline

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use facegate_core::{
    application::DetectionService,
    domain::gateway_config::{GatewayConfig, GatewayConfigManifest},
    infrastructure::{detectors::DetectorRegistry, event_bus::EventBus, telemetry},
    presentation::{
        api::{app, AppState},
        grpc::server::start_grpc_server,
    },
};

/// Parse `host:port` into a bind address.
pub fn bind_addr(host: &str, port: u16) -> Result<SocketAddr> {
    format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", host, port))
}

pub async fn start_gateway(manifest: GatewayConfigManifest) -> Result<()> {
    manifest
        .validate()
        .context("Configuration validation failed")?;

    info!(
        name = %manifest.metadata.name,
        "facegate {} starting",
        env!("CARGO_PKG_VERSION")
    );

    let config: GatewayConfig = manifest.spec;

    let metrics = telemetry::install_prometheus_recorder()?;
    let event_bus = EventBus::new(config.events.channel_capacity);
    let detectors = Arc::new(
        DetectorRegistry::from_config(&config).context("Failed to initialize detectors")?,
    );
    let service = Arc::new(
        DetectionService::from_config(&config, detectors.clone(), event_bus.clone())
            .context("Failed to build detection pipeline")?,
    );

    if let Err(e) = detectors.check_ready().await {
        warn!(
            detector = detectors.default_name(),
            error = %e,
            "Default detector not reachable yet; /readyz will report unavailable"
        );
    }

    let state = AppState::new(service.clone(), event_bus, detectors)?.with_metrics(metrics);
    let router = app(state, config.request.max_image_bytes);

    let http_addr = bind_addr(&config.server.host, config.server.http_port)?;
    let grpc_addr = bind_addr(&config.server.host, config.server.grpc_port)?;

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    let listener = TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", http_addr))?;
    info!("HTTP surface listening on {}", http_addr);

    let http = async {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.clone().cancelled_owned())
            .await
            .context("HTTP server failed")
    };
    let grpc = async {
        start_grpc_server(grpc_addr, service, shutdown.clone().cancelled_owned())
            .await
            .context("gRPC server failed")
    };

    let result = tokio::try_join!(http, grpc);
    // Bring the other server down if one failed
    shutdown.cancel();
    result?;

    info!("facegate shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_addr() {
        assert_eq!(bind_addr("0.0.0.0", 8080).unwrap().port(), 8080);
        assert!(bind_addr("127.0.0.1", 50051).unwrap().ip().is_loopback());
        assert!(bind_addr("not a host", 80).is_err());
    }
}
