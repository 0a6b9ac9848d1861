// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use facegate_core::domain::gateway_config::GatewayConfigManifest;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective manifest as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./facegate-config.yaml)
        #[arg(short, long, default_value = "./facegate-config.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, force } => generate(output, force).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let manifest = GatewayConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. FACEGATE_CONFIG_PATH: {}",
            std::env::var("FACEGATE_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./facegate-config.yaml");
        println!("  4. ~/.facegate/config.yaml");
        println!("  5. /etc/facegate/config.yaml");
        println!();
    }

    if as_yaml {
        print!("{}", manifest.to_yaml()?);
        return Ok(());
    }

    let config = &manifest.spec;
    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", manifest.metadata.name);
    println!();

    println!("{}", "Server:".bold());
    println!("  HTTP: {}:{}", config.server.host, config.server.http_port);
    println!("  gRPC: {}:{}", config.server.host, config.server.grpc_port);
    println!();

    println!("{}", "Requests:".bold());
    println!("  Default confidence: {}", config.request.default_confidence);
    println!("  Max image bytes: {}", config.request.max_image_bytes);
    println!(
        "  SLO budget: {}ms ({:?} pool)",
        config.slo.effective_budget().as_millis(),
        config.slo.pool
    );
    println!();

    println!("{}", "Detectors:".bold());
    for detector in &config.detectors {
        let marker = if detector.name == config.default_detector {
            " (default)".green().to_string()
        } else {
            String::new()
        };
        let state = if detector.enabled {
            String::new()
        } else {
            " [disabled]".dimmed().to_string()
        };
        println!(
            "  {} ({}){}{}",
            detector.name.bold(),
            detector.detector_type,
            marker,
            state
        );
        println!("    Endpoint: {}", detector.endpoint);
    }
    println!();

    println!("{}", "Events:".bold());
    println!("  Topic: {}", config.events.topic);
    println!("  Source: {}", config.events.source);
    println!(
        "  Webhook: {}",
        config.events.webhook_url.as_deref().unwrap_or("(none)")
    );
    println!(
        "  Retry: {} attempts, backoff {:?}..{:?}",
        config.events.retry.max_attempts,
        config.events.retry.initial_backoff,
        config.events.retry.max_backoff
    );
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let manifest = GatewayConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    manifest
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

/// Sample manifest: the defaults, with a header explaining where it is read from.
pub fn sample_config() -> Result<String> {
    let body = GatewayConfigManifest::default().to_yaml()?;
    Ok(format!(
        "# facegate gateway configuration\n\
         #\n\
         # Discovered from --config, FACEGATE_CONFIG_PATH, ./facegate-config.yaml,\n\
         # ~/.facegate/config.yaml or /etc/facegate/config.yaml (first match wins).\n\
         # Detector endpoints and events.webhook_url accept \"env:VAR_NAME\".\n\
         \n{}",
        body
    ))
}

async fn generate(output: PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }

    std::fs::write(&output, sample_config()?)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
