//! Model Registry: static, process-wide capability table for each enabled
//! NWP model, loaded once at startup from `config/models/*.yaml`.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use pnw_common::ConfigError;
use serde::Deserialize;

/// Upstream product tier a raw field belongs to (e.g. surface vs. pressure
/// level files are separate downloads for most providers).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProductTier {
    pub name: String,
    pub filter_support: bool,
}

/// Capabilities and scheduling parameters for one NWP model.
///
/// Immutable after load. Unknown/missing YAML fields fail fast with
/// `ConfigError` rather than silently defaulting, per the startup
/// validation policy.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    pub provider: String,
    pub resolution: String,
    pub run_hours: Vec<u32>,
    pub max_forecast_hour: u32,
    pub forecast_increment: u32,
    pub products: Vec<ProductTier>,
    pub has_precip_type_masks: bool,
    pub has_upper_air: bool,
    #[serde(default)]
    pub excluded_variables: Vec<String>,
    pub enabled: bool,
    pub display_color: String,
    pub filter_support: bool,
    /// `check_interval_seconds` after a run's availability deadline before
    /// the scheduler starts probing for that run's forecast hours.
    pub check_offset_minutes: u32,
    /// Hours between native accumulation resets (the upstream `tp` field
    /// is a bucket total that resets at this boundary, not a running total
    /// from fh=0). Determines the accumulation-layer's bucket series.
    pub accumulation_bucket_hours: u32,
    /// When true, precipitation must be integrated from the instantaneous
    /// `prate` field (trapezoidal rule) instead of read directly from a
    /// native accumulated `tp` field.
    pub precip_is_instantaneous_rate: bool,
}

impl ModelConfig {
    pub fn expected_forecast_hours(&self) -> Vec<u32> {
        (0..=self.max_forecast_hour)
            .step_by(self.forecast_increment.max(1) as usize)
            .collect()
    }

    pub fn supports_variable(&self, variable_id: &str) -> bool {
        !self.excluded_variables.iter().any(|v| v == variable_id)
    }
}

/// Read-only lookup of `ModelConfig` by id, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, ModelConfig>,
}

impl ModelRegistry {
    pub fn from_models(models: Vec<ModelConfig>) -> Self {
        Self {
            models: models.into_iter().map(|m| (m.id.clone(), m)).collect(),
        }
    }

    /// Load every `*.yaml` file in `config_dir` as one `ModelConfig`.
    pub fn load_from_dir(config_dir: &Path) -> Result<Self, ConfigError> {
        let mut models = Vec::new();
        let entries = fs::read_dir(config_dir).map_err(|e| ConfigError::Io {
            path: config_dir.display().to_string(),
            source: e,
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| ConfigError::Io {
                path: config_dir.display().to_string(),
                source: e,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            let contents = fs::read_to_string(&path).map_err(|e| ConfigError::Io {
                path: path.display().to_string(),
                source: e,
            })?;
            let model: ModelConfig =
                serde_yaml::from_str(&contents).map_err(|e| ConfigError::Yaml {
                    path: path.display().to_string(),
                    source: e,
                })?;
            models.push(model);
        }

        Ok(Self::from_models(models))
    }

    pub fn get(&self, model_id: &str) -> Result<&ModelConfig, ConfigError> {
        self.models
            .get(model_id)
            .ok_or_else(|| ConfigError::UnknownModel(model_id.to_string()))
    }

    pub fn list_enabled(&self) -> Vec<&ModelConfig> {
        let mut enabled: Vec<&ModelConfig> = self.models.values().filter(|m| m.enabled).collect();
        enabled.sort_by(|a, b| a.id.cmp(&b.id));
        enabled
    }
}
