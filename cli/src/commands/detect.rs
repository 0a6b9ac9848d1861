// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `facegate detect` - call a running gateway's `POST /detect_face`

use anyhow::{Context, Result};
use base64::Engine;
use clap::Args;
use colored::Colorize;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;

#[derive(Args, Debug)]
#[command(group(clap::ArgGroup::new("image").required(true).args(["url", "file"])))]
pub struct DetectArgs {
    /// Image URL
    #[arg(long)]
    pub url: Option<String>,

    /// Local image file (sent as base64)
    #[arg(long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Minimum confidence in [0, 1]
    #[arg(long)]
    pub confidence: Option<f64>,

    /// Detector variant hint
    #[arg(long)]
    pub model: Option<String>,

    /// Correlation id to thread through logs and face-events
    #[arg(long)]
    pub correlation_id: Option<String>,

    /// Gateway base URL
    #[arg(long, env = "FACEGATE_ENDPOINT", default_value = "http://127.0.0.1:8080")]
    pub endpoint: String,

    /// Print the raw JSON response
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Deserialize)]
struct DetectFaceResponse {
    detections: Vec<DetectionDto>,
    latency_ms: u64,
    request_id: String,
}

#[derive(Debug, Deserialize)]
struct DetectionDto {
    bbox: [f32; 4],
    confidence: f32,
    #[serde(default)]
    landmarks: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error_code: String,
    message: String,
    #[serde(default)]
    request_id: Option<String>,
}

/// Request body for `POST /detect_face`.
pub fn build_request_body(args: &DetectArgs) -> Result<Value> {
    let image = match (&args.url, &args.file) {
        (Some(url), None) => json!({ "url": url }),
        (None, Some(path)) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read image {}", path.display()))?;
            json!({ "bytes": base64::engine::general_purpose::STANDARD.encode(bytes) })
        }
        _ => anyhow::bail!("Exactly one of --url or --file is required"),
    };

    let mut options = serde_json::Map::new();
    if let Some(confidence) = args.confidence {
        options.insert("confidence".to_string(), json!(confidence));
    }
    if let Some(model) = &args.model {
        options.insert("model".to_string(), json!(model));
    }

    let mut body = json!({ "image": image, "options": options });
    if let Some(id) = &args.correlation_id {
        body["correlation_id"] = json!(id);
    }
    Ok(body)
}

pub async fn run(args: DetectArgs) -> Result<()> {
    let body = build_request_body(&args)?;
    let url = format!("{}/detect_face", args.endpoint.trim_end_matches('/'));

    let response = reqwest::Client::new()
        .post(&url)
        .json(&body)
        .send()
        .await
        .with_context(|| format!("Failed to reach gateway at {}", args.endpoint))?;

    let status = response.status();
    let payload: Value = response
        .json()
        .await
        .context("Gateway returned a non-JSON response")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&payload)?);
        if !status.is_success() {
            anyhow::bail!("Detection failed with HTTP {}", status);
        }
        return Ok(());
    }

    if !status.is_success() {
        let error: ErrorBody =
            serde_json::from_value(payload).context("Unexpected error body from gateway")?;
        eprintln!(
            "{} {} ({})",
            "✗".red(),
            error.message,
            error.error_code.yellow()
        );
        if let Some(id) = error.request_id {
            eprintln!("  request_id: {}", id.dimmed());
        }
        anyhow::bail!("Detection failed with HTTP {}", status);
    }

    let result: DetectFaceResponse =
        serde_json::from_value(payload).context("Unexpected response from gateway")?;
    print_result(&result);
    Ok(())
}

fn print_result(result: &DetectFaceResponse) {
    println!(
        "{} {} face(s) in {}ms",
        "✓".green(),
        result.detections.len().to_string().bold(),
        result.latency_ms
    );
    println!("  request_id: {}", result.request_id.dimmed());
    for (i, d) in result.detections.iter().enumerate() {
        println!(
            "  [{}] bbox=[{:.0}, {:.0}, {:.0}, {:.0}] confidence={:.3}",
            i, d.bbox[0], d.bbox[1], d.bbox[2], d.bbox[3], d.confidence
        );
        for (name, point) in &d.landmarks {
            println!("      {}: {}", name, point);
        }
    }
}
