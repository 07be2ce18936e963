//! Player configuration.
//!
//! Loaded from an optional YAML file; every section falls back to its
//! defaults, and command-line flags override individual values afterwards.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use forecast_common::BoundingBox;
use ingestion::PipelineConfig;
use playback::PlaybackConfig;
use renderer::RasterConfig;
use serde::Deserialize;
use storage::{CacheConfig, DEFAULT_RETENTION_HOURS};
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub pipeline: PipelineConfig,
    pub cache: CacheSettings,
    pub raster: RasterConfig,
    pub playback: PlaybackConfig,
    pub view: ViewSettings,
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub path: PathBuf,
    pub retention_hours: i64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/batch-cache.db"),
            retention_hours: DEFAULT_RETENTION_HOURS,
        }
    }
}

impl CacheSettings {
    /// Ten years; anything longer is a typo.
    pub const MAX_RETENTION_HOURS: i64 = 87_600;

    pub fn validate(&self) -> Result<()> {
        if !(1..=Self::MAX_RETENTION_HOURS).contains(&self.retention_hours) {
            bail!(
                "cache.retention_hours must be between 1 and {}, got {}",
                Self::MAX_RETENTION_HOURS,
                self.retention_hours
            );
        }
        Ok(())
    }

    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig {
            path: self.path.clone(),
            retention: chrono::Duration::hours(self.retention_hours),
        }
    }
}

/// What is shown: the selected variable and the map viewport.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ViewSettings {
    pub variable: String,
    /// `[min_lon, min_lat, max_lon, max_lat]`
    pub bbox: [f64; 4],
    pub zoom: f64,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            variable: "T2".to_string(),
            bbox: [-10.0, 35.0, 30.0, 60.0],
            zoom: 5.0,
        }
    }
}

impl ViewSettings {
    pub fn bounds(&self) -> BoundingBox {
        let [min_lon, min_lat, max_lon, max_lat] = self.bbox;
        BoundingBox::new(min_lon, min_lat, max_lon, max_lat)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub dir: PathBuf,
    /// Also write intermediate cross-fade composites
    pub write_transitions: bool,
    /// Event loop tick in milliseconds
    pub tick_ms: u64,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("frames"),
            write_transitions: false,
            tick_ms: 30,
        }
    }
}

impl PlayerConfig {
    /// Load from `path`, or use defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        info!(path = %path.display(), "Loaded player configuration");
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.cache.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_means_defaults() {
        let config = PlayerConfig::load(None).unwrap();
        assert_eq!(config.view.variable, "T2");
        assert_eq!(config.pipeline.max_in_flight, 2);
        assert_eq!(config.cache.retention_hours, 12);
        assert_eq!(config.playback.fade_ms, 150);
    }

    #[test]
    fn test_partial_yaml() {
        let config = PlayerConfig::from_yaml(
            r#"
pipeline:
  base_url: https://forecast.example/api
  max_in_flight: 4
view:
  variable: RH2
  bbox: [5.0, 45.0, 7.0, 47.0]
playback:
  base_interval_ms: 400
"#,
        )
        .unwrap();

        assert_eq!(config.pipeline.base_url, "https://forecast.example/api");
        assert_eq!(config.pipeline.max_in_flight, 4);
        assert_eq!(config.view.variable, "RH2");
        assert_eq!(config.view.zoom, 5.0);
        assert_eq!(config.view.bounds(), BoundingBox::new(5.0, 45.0, 7.0, 47.0));
        assert_eq!(config.playback.base_interval_ms, 400);
        assert_eq!(config.playback.fade_ms, 150);
        assert_eq!(config.raster.opacity, 0.7);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cache:\n  retention_hours: 2\noutput:\n  tick_ms: 10").unwrap();

        let config = PlayerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.cache.retention_hours, 2);
        assert_eq!(config.cache.to_cache_config().retention, chrono::Duration::hours(2));
        assert_eq!(config.output.tick_ms, 10);
    }

    #[test]
    fn test_invalid_yaml_names_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "view: [not, a, map]").unwrap();

        let err = PlayerConfig::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_out_of_range_retention_is_rejected() {
        for hours in ["-5", "0", "9223372036854775807"] {
            let yaml = format!("cache:\n  retention_hours: {hours}");
            let err = PlayerConfig::from_yaml(&yaml).unwrap_err();
            assert!(err.to_string().contains("retention_hours"), "{hours}: {err}");
        }
        assert!(PlayerConfig::from_yaml("cache:\n  retention_hours: 87600").is_ok());
    }

    #[test]
    fn test_invalid_retention_in_file_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cache:\n  retention_hours: -5").unwrap();

        let err = PlayerConfig::load(Some(file.path())).unwrap_err();
        assert!(format!("{err:#}").contains("retention_hours"));
    }
}
