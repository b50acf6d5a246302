use msface_core::client::{DEFAULT_DETECTION_MODEL, DEFAULT_RECOGNITION_MODEL, DEFAULT_REGION};
use msface_core::ClientConfig;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::camera::CameraSource;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/msface/msface.toml";
const DEFAULT_CONFIDENCE: f64 = 80.0;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Daemon configuration, loaded from a TOML file with `MSFACE_*` overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Face API subscription key.
    pub api_key: String,
    /// Person group used for identification.
    pub group: String,
    /// Azure region hosting the Face API resource.
    #[serde(default = "default_region")]
    pub region: String,
    /// Base URL override; takes precedence over `region`.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Minimum identify confidence in percent (0–100).
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default = "default_recognition_model")]
    pub recognition_model: String,
    #[serde(default = "default_detection_model")]
    pub detection_model: String,
    /// HTTP request timeout in seconds; unset keeps the client default.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Cameras to bind a face identify device to.
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,
}

/// One camera binding.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Camera entity id used to address the device (e.g. "camera.front_door").
    pub entity_id: String,
    /// Display name of the device.
    #[serde(default)]
    pub name: Option<String>,
    /// URL returning a still image (JPEG/PNG).
    #[serde(default)]
    pub snapshot_url: Option<String>,
    /// Image file re-read on every snapshot.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

fn default_recognition_model() -> String {
    DEFAULT_RECOGNITION_MODEL.to_string()
}

fn default_detection_model() -> String {
    DEFAULT_DETECTION_MODEL.to_string()
}

impl Config {
    /// Config file path from `MSFACE_CONFIG`, falling back to the default location.
    pub fn path_from_env() -> PathBuf {
        std::env::var("MSFACE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Read, override from the process environment and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Like [`Config::load`], reading overrides through `lookup`.
    pub fn load_with(
        path: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_with(&raw, lookup)
    }

    /// Parse `raw`, apply overrides read through `lookup` and validate.
    pub fn from_toml_with(
        raw: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::from_toml_str(raw)?;
        config.apply_overrides(lookup);
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `MSFACE_*` overrides using `lookup` to read variables.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("MSFACE_API_KEY") {
            self.api_key = v;
        }
        if let Some(v) = lookup("MSFACE_GROUP") {
            self.group = v;
        }
        if let Some(v) = lookup("MSFACE_REGION") {
            self.region = v;
        }
        if let Some(v) = lookup("MSFACE_ENDPOINT") {
            self.endpoint = Some(v);
        }
        match lookup("MSFACE_CONFIDENCE").map(|v| v.parse::<f64>()) {
            Some(Ok(v)) => self.confidence = v,
            Some(Err(_)) => tracing::warn!("ignoring unparsable MSFACE_CONFIDENCE"),
            None => {}
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid("api_key must not be empty".into()));
        }
        if self.group.trim().is_empty() {
            return Err(ConfigError::Invalid("group must not be empty".into()));
        }
        if !(0.0..=100.0).contains(&self.confidence) {
            return Err(ConfigError::Invalid(format!(
                "confidence must be within 0..=100, got {}",
                self.confidence
            )));
        }
        if self.sources.is_empty() {
            return Err(ConfigError::Invalid("at least one [[source]] is required".into()));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.entity_id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate source entity_id {}",
                    source.entity_id
                )));
            }
            source.camera()?;
        }

        // Devices are addressed by entity id or name, so every name must be unambiguous.
        let mut names = HashSet::new();
        for source in &self.sources {
            let name = source.device_name();
            if seen.contains(name.as_str()) && name != source.entity_id {
                return Err(ConfigError::Invalid(format!(
                    "source {} is named after another source's entity_id {name}",
                    source.entity_id
                )));
            }
            if !names.insert(name.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate device name {name}"
                )));
            }
        }
        Ok(())
    }

    /// Request timeout shared by the Face API client and snapshot cameras.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Face API client settings shared by all devices.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            api_key: self.api_key.clone(),
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            recognition_model: self.recognition_model.clone(),
            detection_model: self.detection_model.clone(),
            timeout: self.timeout(),
        }
    }
}

impl SourceConfig {
    /// Device name: the configured name, or one derived from the entity id.
    pub fn device_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => {
                let slug: String = self
                    .entity_id
                    .chars()
                    .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                    .collect();
                format!("face_identity_{slug}")
            }
        }
    }

    /// Where snapshots for this camera come from; exactly one origin is allowed.
    pub fn camera(&self) -> Result<CameraSource, ConfigError> {
        match (&self.snapshot_url, &self.snapshot_path) {
            (Some(url), None) => Ok(CameraSource::Url(url.clone())),
            (None, Some(path)) => Ok(CameraSource::File(path.clone())),
            (Some(_), Some(_)) => Err(ConfigError::Invalid(format!(
                "source {} sets both snapshot_url and snapshot_path",
                self.entity_id
            ))),
            (None, None) => Err(ConfigError::Invalid(format!(
                "source {} needs snapshot_url or snapshot_path",
                self.entity_id
            ))),
        }
    }
}
