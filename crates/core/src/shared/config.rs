use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    DEFAULT_SERVER_URL, DETECTION_YIELD_MS, DETECTOR_INPUT_SIZE, LEGACY_MIN_PROBABILITY,
    PREVIEW_HEIGHT, PREVIEW_WIDTH, RENDER_INTERVAL_MS,
};
use crate::shared::crop_rect::DEFAULT_ZOOM;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Client settings. Every field is optional in the JSON file and falls back
/// to the built-in default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_url: String,
    pub zoom: f64,
    pub detector_input_size: u32,
    pub preview_width: u32,
    pub preview_height: u32,
    pub detection_yield_ms: u64,
    pub render_interval_ms: u64,
    /// `None` waits on the backend indefinitely.
    pub request_timeout_secs: Option<u64>,
    pub min_probability: f64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            zoom: DEFAULT_ZOOM,
            detector_input_size: DETECTOR_INPUT_SIZE,
            preview_width: PREVIEW_WIDTH,
            preview_height: PREVIEW_HEIGHT,
            detection_yield_ms: DETECTION_YIELD_MS,
            render_interval_ms: RENDER_INTERVAL_MS,
            request_timeout_secs: None,
            min_probability: LEGACY_MIN_PROBABILITY,
        }
    }
}

impl ClientConfig {
    /// `<config dir>/PartScan/client.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("PartScan").join("client.json"))
    }

    /// Loads an explicit config file, or the per-user file when `path` is
    /// `None`. A missing per-user file yields the defaults; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::read(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::read(&path)?,
                None => Self::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config = serde_json::from_str(&json).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        log::debug!("Loaded client config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_url.trim().is_empty() {
            return Err(invalid("server_url", "must not be empty".into()));
        }
        if !self.zoom.is_finite() || self.zoom <= 0.0 {
            return Err(invalid("zoom", format!("must be positive, got {}", self.zoom)));
        }
        if self.detector_input_size == 0 {
            return Err(invalid("detector_input_size", "must be positive".into()));
        }
        if self.preview_width == 0 || self.preview_height == 0 {
            return Err(invalid(
                "preview_width/preview_height",
                format!(
                    "must be positive, got {}x{}",
                    self.preview_width, self.preview_height
                ),
            ));
        }
        if self.detection_yield_ms == 0 {
            return Err(invalid("detection_yield_ms", "must be at least 1".into()));
        }
        if self.render_interval_ms == 0 {
            return Err(invalid("render_interval_ms", "must be at least 1".into()));
        }
        Ok(())
    }

    pub fn detection_yield(&self) -> Duration {
        Duration::from_millis(self.detection_yield_ms)
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}
