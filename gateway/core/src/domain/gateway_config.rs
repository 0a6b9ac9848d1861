// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Gateway Configuration Types
//
// Defines the deployment manifest for a face detection gateway, including:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Listener addresses for the HTTP and gRPC surfaces
// - Request defaults and payload limits
// - SLO budget per detector pool (CPU/GPU)
// - Detector variants (model_hint targets)
// - face-events publication and retry policy
// - Logging settings

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::detection::DEFAULT_CONFIDENCE_FLOOR;

pub const API_VERSION: &str = "facegate/v1";
pub const KIND: &str = "GatewayConfig";

/// Top-level Kubernetes-style gateway configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfigManifest {
    /// API version (must be "facegate/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "GatewayConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable deployment name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// Gateway configuration specification (content under spec:)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub request: RequestConfig,

    #[serde(default)]
    pub slo: SloConfig,

    /// Detector variants; `model_hint` selects among them by name
    #[serde(default)]
    pub detectors: Vec<DetectorConfig>,

    /// Variant used when no (known) hint is given
    #[serde(default = "default_detector_name")]
    pub default_detector: String,

    #[serde(default)]
    pub events: EventsConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub host: String,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    #[serde(default = "default_grpc_port")]
    pub grpc_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Floor applied when the caller omits `confidence`
    #[serde(default = "default_confidence")]
    pub default_confidence: f32,

    /// Largest decoded image payload accepted (bytes)
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
}

/// Kind of hardware backing the detector pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolKind {
    Cpu,
    Gpu,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SloConfig {
    #[serde(default = "default_pool")]
    pub pool: PoolKind,

    /// Explicit budget; falls back to the pool default (cpu 200ms, gpu 80ms)
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub budget: Option<Duration>,
}

impl SloConfig {
    pub fn effective_budget(&self) -> Duration {
        self.budget.unwrap_or(match self.pool {
            PoolKind::Cpu => Duration::from_millis(200),
            PoolKind::Gpu => Duration::from_millis(80),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Variant name (e.g., "default", "retinaface-gpu")
    pub name: String,

    /// Detector type ("http")
    #[serde(rename = "type")]
    pub detector_type: String,

    /// Base URL of the hosted model (supports "env:VAR_NAME")
    pub endpoint: String,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// `source` field stamped on every FaceEvent
    #[serde(default = "default_event_source")]
    pub source: String,

    #[serde(default = "default_topic")]
    pub topic: String,

    /// In-process broadcast buffer (events)
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Optional HTTP sink for the topic (supports "env:VAR_NAME")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total publish attempts per sink, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff", with = "humantime_serde")]
    pub initial_backoff: Duration,

    #[serde(default = "default_max_backoff", with = "humantime_serde")]
    pub max_backoff: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_grpc_port() -> u16 {
    50051
}

fn default_confidence() -> f32 {
    DEFAULT_CONFIDENCE_FLOOR
}

fn default_max_image_bytes() -> usize {
    16 * 1024 * 1024
}

fn default_pool() -> PoolKind {
    PoolKind::Cpu
}

fn default_detector_name() -> String {
    "default".to_string()
}

fn default_event_source() -> String {
    "face-detection-gateway".to_string()
}

fn default_topic() -> String {
    "face-events".to_string()
}

fn default_channel_capacity() -> usize {
    1000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> Duration {
    Duration::from_millis(50)
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(1)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_bind_address(),
            http_port: default_http_port(),
            grpc_port: default_grpc_port(),
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            default_confidence: default_confidence(),
            max_image_bytes: default_max_image_bytes(),
        }
    }
}

impl Default for SloConfig {
    fn default() -> Self {
        Self {
            pool: default_pool(),
            budget: None,
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            source: default_event_source(),
            topic: default_topic(),
            channel_capacity: default_channel_capacity(),
            webhook_url: None,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            request: RequestConfig::default(),
            slo: SloConfig::default(),
            detectors: vec![DetectorConfig {
                name: default_detector_name(),
                detector_type: "http".to_string(),
                endpoint: "http://127.0.0.1:9000".to_string(),
                enabled: true,
            }],
            default_detector: default_detector_name(),
            events: EventsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Default for GatewayConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "face-detection-gateway".to_string(),
                labels: None,
            },
            spec: GatewayConfig::default(),
        }
    }
}

/// Resolve "env:VAR_NAME" indirection
pub fn resolve_env_ref(value: &str) -> anyhow::Result<String> {
    match value.strip_prefix("env:") {
        Some(var_name) => std::env::var(var_name)
            .map_err(|_| anyhow::anyhow!("Environment variable not set: {}", var_name)),
        None => Ok(value.to_string()),
    }
}

impl GatewayConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. FACEGATE_CONFIG_PATH environment variable
    /// 2. ./facegate-config.yaml (working directory)
    /// 3. ~/.facegate/config.yaml (user home)
    /// 4. /etc/facegate/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("FACEGATE_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./facegate-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".facegate").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/facegate/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            Self::from_yaml_file(config_path)?
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("FACEGATE_SLO_BUDGET_MS") {
            match val.parse::<u64>() {
                Ok(ms) => {
                    tracing::info!("Environment override: FACEGATE_SLO_BUDGET_MS={}", ms);
                    self.spec.slo.budget = Some(Duration::from_millis(ms));
                }
                Err(_) => {
                    tracing::warn!(
                        "Invalid value for FACEGATE_SLO_BUDGET_MS: '{}'. Expected milliseconds. Ignoring.",
                        val
                    );
                }
            }
        }

        if let Ok(url) = std::env::var("FACEGATE_EVENTS_WEBHOOK_URL") {
            tracing::info!("Environment override: FACEGATE_EVENTS_WEBHOOK_URL");
            self.spec.events.webhook_url = Some(url);
        }

        if let Ok(level) = std::env::var("FACEGATE_LOG_LEVEL") {
            self.spec.observability.log_level = level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let spec = &self.spec;

        if !(0.0..=1.0).contains(&spec.request.default_confidence) {
            anyhow::bail!(
                "request.default_confidence must be within [0, 1], got {}",
                spec.request.default_confidence
            );
        }

        if spec.request.max_image_bytes == 0 {
            anyhow::bail!("request.max_image_bytes must be greater than zero");
        }

        if spec.slo.effective_budget().is_zero() {
            anyhow::bail!("slo.budget must be greater than zero");
        }

        let mut names = HashSet::new();
        for detector in &spec.detectors {
            if detector.name.is_empty() {
                anyhow::bail!("Detector name cannot be empty");
            }
            if !names.insert(detector.name.as_str()) {
                anyhow::bail!("Duplicate detector name: {}", detector.name);
            }
            if detector.detector_type != "http" {
                anyhow::bail!(
                    "Unsupported detector type '{}' for: {}",
                    detector.detector_type,
                    detector.name
                );
            }
            if detector.endpoint.starts_with("env:") {
                continue;
            }
            let endpoint = url::Url::parse(&detector.endpoint).map_err(|e| {
                anyhow::anyhow!("Invalid endpoint for detector {}: {}", detector.name, e)
            })?;
            if !matches!(endpoint.scheme(), "http" | "https") {
                anyhow::bail!("Detector endpoint must be http(s) for: {}", detector.name);
            }
        }

        if !spec
            .detectors
            .iter()
            .any(|d| d.enabled && d.name == spec.default_detector)
        {
            anyhow::bail!(
                "Default detector '{}' not found among enabled detectors",
                spec.default_detector
            );
        }

        if spec.events.retry.max_attempts == 0 {
            anyhow::bail!("events.retry.max_attempts must be at least 1");
        }

        if spec.events.channel_capacity == 0 {
            anyhow::bail!("events.channel_capacity must be greater than zero");
        }

        Ok(())
    }
}
