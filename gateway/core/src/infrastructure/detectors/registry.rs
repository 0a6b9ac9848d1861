// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Detector Registry - Variant Resolution
//
// Holds the process-wide detector handles, initialized once at start-up and
// read-only afterwards. `model_hint` is advisory: a hint naming a known
// variant selects it, anything else falls back to the default.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::detector::{Detector, DetectorError};
use crate::domain::gateway_config::{resolve_env_ref, DetectorConfig, GatewayConfig};

use super::http::HttpDetector;

pub struct DetectorRegistry {
    detectors: HashMap<String, Arc<dyn Detector>>,
    default_name: String,
}

impl DetectorRegistry {
    /// Registry with a single (default) variant.
    pub fn new(default_name: impl Into<String>, detector: Arc<dyn Detector>) -> Self {
        let default_name = default_name.into();
        let mut detectors = HashMap::new();
        detectors.insert(default_name.clone(), detector);
        Self {
            detectors,
            default_name,
        }
    }

    pub fn with_variant(mut self, name: impl Into<String>, detector: Arc<dyn Detector>) -> Self {
        self.detectors.insert(name.into(), detector);
        self
    }

    /// Create registry from gateway configuration
    pub fn from_config(config: &GatewayConfig) -> anyhow::Result<Self> {
        info!("Initializing detector registry");

        let mut detectors: HashMap<String, Arc<dyn Detector>> = HashMap::new();
        for detector_config in &config.detectors {
            if !detector_config.enabled {
                info!("Detector '{}' disabled, skipping", detector_config.name);
                continue;
            }

            match Self::create_detector(detector_config) {
                Ok(detector) => {
                    info!("Registered detector variant: {}", detector_config.name);
                    detectors.insert(detector_config.name.clone(), detector);
                }
                Err(e) => {
                    warn!("Failed to initialize detector '{}': {}", detector_config.name, e);
                }
            }
        }

        if !detectors.contains_key(&config.default_detector) {
            anyhow::bail!(
                "Default detector '{}' could not be initialized",
                config.default_detector
            );
        }

        Ok(Self {
            detectors,
            default_name: config.default_detector.clone(),
        })
    }

    fn create_detector(config: &DetectorConfig) -> anyhow::Result<Arc<dyn Detector>> {
        let endpoint = resolve_env_ref(&config.endpoint)?;

        let detector: Arc<dyn Detector> = match config.detector_type.as_str() {
            "http" => Arc::new(HttpDetector::new(endpoint)?),
            other => anyhow::bail!("Unsupported detector type: {}", other),
        };

        Ok(detector)
    }

    /// Resolve the detector for an (advisory) model hint.
    pub fn resolve(&self, hint: Option<&str>) -> Arc<dyn Detector> {
        if let Some(hint) = hint {
            if let Some(detector) = self.detectors.get(hint) {
                return detector.clone();
            }
            debug!("Unknown model hint '{}', using default detector", hint);
        }
        self.default_detector()
    }

    fn default_detector(&self) -> Arc<dyn Detector> {
        // Constructors guarantee the default variant is present
        self.detectors[&self.default_name].clone()
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    /// Readiness probe: is the default detector reachable?
    pub async fn check_ready(&self) -> Result<(), DetectorError> {
        self.default_detector().health_check().await
    }

    /// Get list of available variant names
    pub fn variants(&self) -> Vec<String> {
        let mut names: Vec<String> = self.detectors.keys().cloned().collect();
        names.sort();
        names
    }
}
