//! Service-level configuration, loaded once at startup and immutable
//! thereafter (spec `6`). Per-model capability tables live in
//! `derived_fields::model_registry` and are loaded separately via
//! `ModelRegistry::load_from_dir`; this module owns everything else the
//! process needs to know before it can start the scheduler.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use pnw_common::{BoundingBox, ConfigError};

/// One upstream data provider, in the priority order the fetcher should try
/// them (spec `4.4`/`6`).
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: ProviderKind,
    pub base_url: String,
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_provider_timeout_secs() -> u64 {
    120
}

fn default_max_attempts() -> u32 {
    3
}

/// The two upstream protocols spec `6` enumerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Server-side field/level/region subsetting over HTTPS query params.
    FilterCapable,
    /// Object-store mirror: full-product download, client-side subsetting.
    Mirror,
}

/// Per-variable station-overlay policy (spec `4.6`). Absence of an entry for
/// a `variable_id` means overlays are disabled for it (fail-safe default).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OverlayPolicy {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_min_spacing_px")]
    pub min_spacing_px: u32,
}

impl Default for OverlayPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            min_spacing_px: default_min_spacing_px(),
        }
    }
}

fn default_min_spacing_px() -> u32 {
    40
}

/// Retention counts/windows (spec `4.8`/`6`).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RetentionSettings {
    /// Publish directory and cache directory both retain this many most
    /// recent `run_time`s per model.
    #[serde(default = "default_keep_last_runs")]
    pub keep_last_runs: usize,
    /// `GribCache::sweep_stale_partials` threshold, in hours.
    #[serde(default = "default_stale_partial_hours")]
    pub stale_partial_hours: u64,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            keep_last_runs: default_keep_last_runs(),
            stale_partial_hours: default_stale_partial_hours(),
        }
    }
}

fn default_keep_last_runs() -> usize {
    4
}

fn default_stale_partial_hours() -> u64 {
    1
}

/// The on-disk, `serde`-deserialized shape of the service config file.
#[derive(Debug, Clone, Deserialize)]
struct RawServiceConfig {
    storage_path: PathBuf,
    cache_root: PathBuf,
    model_config_dir: PathBuf,
    region: RawRegion,
    #[serde(default)]
    retention: RetentionSettings,
    providers: Vec<ProviderConfig>,
    #[serde(default = "default_max_workers")]
    max_workers: usize,
    #[serde(default = "default_monitoring_window_secs")]
    monitoring_window_secs: u64,
    #[serde(default = "default_check_interval_secs")]
    check_interval_secs: u64,
    station_catalog_path: PathBuf,
    #[serde(default)]
    station_overrides_path: Option<PathBuf>,
    style_config_path: PathBuf,
    #[serde(default)]
    overlay_policy: HashMap<String, OverlayPolicy>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct RawRegion {
    west: f64,
    south: f64,
    east: f64,
    north: f64,
}

fn default_max_workers() -> usize {
    8
}

fn default_monitoring_window_secs() -> u64 {
    90 * 60
}

fn default_check_interval_secs() -> u64 {
    60
}

/// Process-wide, immutable-after-load service configuration (spec `6`).
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub storage_path: PathBuf,
    pub cache_root: PathBuf,
    pub model_config_dir: PathBuf,
    pub region: BoundingBox,
    pub retention: RetentionSettings,
    pub providers: Vec<ProviderConfig>,
    pub max_workers: usize,
    pub monitoring_window: Duration,
    pub check_interval: Duration,
    pub station_catalog_path: PathBuf,
    pub station_overrides_path: Option<PathBuf>,
    pub style_config_path: PathBuf,
    overlay_policy: HashMap<String, OverlayPolicy>,
}

impl ServiceConfig {
    /// Load and validate the service config from a YAML file. Any parse or
    /// I/O failure is a startup-fatal `ConfigError`, matching spec `7`'s
    /// "`ConfigError`: fatal at startup" policy.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let raw: RawServiceConfig =
            serde_yaml::from_str(&contents).map_err(|e| ConfigError::Yaml {
                path: path.display().to_string(),
                source: e,
            })?;

        if raw.providers.is_empty() {
            return Err(ConfigError::InvalidValue {
                model_id: "*".to_string(),
                field: "providers".to_string(),
                message: "at least one provider is required".to_string(),
            });
        }

        let region = BoundingBox::new(raw.region.west, raw.region.south, raw.region.east, raw.region.north);
        if raw.region.west >= raw.region.east || raw.region.south >= raw.region.north {
            return Err(ConfigError::InvalidValue {
                model_id: "*".to_string(),
                field: "region".to_string(),
                message: "region bbox must have west < east and south < north".to_string(),
            });
        }

        Ok(Self {
            storage_path: raw.storage_path,
            cache_root: raw.cache_root,
            model_config_dir: raw.model_config_dir,
            region,
            retention: raw.retention,
            providers: raw.providers,
            max_workers: raw.max_workers.max(1),
            monitoring_window: Duration::from_secs(raw.monitoring_window_secs),
            check_interval: Duration::from_secs(raw.check_interval_secs),
            station_catalog_path: raw.station_catalog_path,
            station_overrides_path: raw.station_overrides_path,
            style_config_path: raw.style_config_path,
            overlay_policy: raw.overlay_policy,
        })
    }

    /// Overlay policy for a variable, defaulting to disabled for any
    /// variable with no explicit entry (fail-safe, per spec `4.6`).
    pub fn overlay_policy_for(&self, variable_id: &str) -> OverlayPolicy {
        self.overlay_policy
            .get(variable_id)
            .copied()
            .unwrap_or_default()
    }

    /// Providers in the priority order the fetcher should try them.
    pub fn providers_in_priority_order(&self) -> &[ProviderConfig] {
        &self.providers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
storage_path: /data/publish
cache_root: /data/cache
model_config_dir: config/models
region:
  west: -130.0
  south: 40.0
  east: -110.0
  north: 55.0
providers:
  - name: nomads
    kind: filter_capable
    base_url: https://nomads.example/cgi-bin/filter
  - name: noaa-mirror
    kind: mirror
    base_url: https://noaa-mirror.example
max_workers: 6
station_catalog_path: config/stations.json
style_config_path: config/styles.json
overlay_policy:
  tmp2m:
    enabled: true
    min_spacing_px: 36
"#
    }

    #[test]
    fn load_parses_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.yaml");
        std::fs::write(&path, sample_yaml()).unwrap();

        let config = ServiceConfig::load(&path).unwrap();
        assert_eq!(config.max_workers, 6);
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[0].kind, ProviderKind::FilterCapable);
        assert!(config.overlay_policy_for("tmp2m").enabled);
        assert!(!config.overlay_policy_for("unknown_variable").enabled);
    }

    #[test]
    fn load_rejects_empty_providers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.yaml");
        std::fs::write(
            &path,
            r#"
storage_path: /data/publish
cache_root: /data/cache
model_config_dir: config/models
region:
  west: -130.0
  south: 40.0
  east: -110.0
  north: 55.0
providers: []
station_catalog_path: config/stations.json
style_config_path: config/styles.json
"#,
        )
        .unwrap();

        let err = ServiceConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn load_rejects_missing_file() {
        let err = ServiceConfig::load(Path::new("/nonexistent/service.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn load_rejects_inverted_region() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.yaml");
        std::fs::write(
            &path,
            r#"
storage_path: /data/publish
cache_root: /data/cache
model_config_dir: config/models
region:
  west: -110.0
  south: 40.0
  east: -130.0
  north: 55.0
providers:
  - name: nomads
    kind: filter_capable
    base_url: https://nomads.example
station_catalog_path: config/stations.json
style_config_path: config/styles.json
"#,
        )
        .unwrap();

        let err = ServiceConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
