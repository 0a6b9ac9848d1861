// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # facegate
//!
//! Face detection gateway. One detection capability, three surfaces:
//!
//! - HTTP `POST /detect_face` and gRPC `facegate.v1.FaceDetection/DetectFace`
//! - MCP tool `detect_face` at `POST /mcp`
//! - the `face-events` stream (SSE at `/events`, optional webhook)
//!
//! ## Commands
//!
//! - `facegate serve` - Run the gateway
//! - `facegate config show|validate|generate` - Configuration management
//! - `facegate detect --url|--file` - Call a running gateway

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use facegate_cli::commands::{self, serve::LogOverrides, ConfigCommand, DetectArgs, ServeArgs};
use facegate_cli::logging::init_logging;
use facegate_core::domain::gateway_config::LogFormat;

/// facegate - face detection gateway
#[derive(Parser)]
#[command(name = "facegate")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "FACEGATE_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format; overrides the config file
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormatArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Compact,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Compact => LogFormat::Compact,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway (HTTP, MCP and gRPC surfaces)
    #[command(name = "serve")]
    Serve(ServeArgs),

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Detect faces through a running gateway
    #[command(name = "detect")]
    Detect(DetectArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let logs = LogOverrides {
        level: cli.log_level,
        format: cli.log_format.map(LogFormat::from),
    };

    match cli.command {
        // serve initializes logging itself, from the merged configuration
        Commands::Serve(args) => commands::serve::run(args, cli.config, logs).await,
        Commands::Config { command } => {
            init_cli_logging(&logs)?;
            commands::config::handle_command(command, cli.config).await
        }
        Commands::Detect(args) => {
            init_cli_logging(&logs)?;
            commands::detect::run(args).await
        }
    }
}

fn init_cli_logging(logs: &LogOverrides) -> Result<()> {
    init_logging(
        logs.level.as_deref().unwrap_or("warn"),
        logs.format.unwrap_or(LogFormat::Compact),
    )
}
