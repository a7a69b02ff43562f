use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thermalign_core::{FeatureConfig, RegistrationConfig};

use crate::error::ConfigError;

/// Application settings, loadable from TOML or JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    /// Weight of the thermal layer in the overlay
    pub alpha: f32,
    /// Last filename token marking thermal images
    pub thermal_suffix: String,
    /// Last filename token marking visible images
    pub visible_suffix: String,
    /// Replaces the thermal suffix in output names
    pub aligned_suffix: String,
    /// Accepted file extensions, matched case-insensitively
    pub extensions: Vec<String>,
    /// Also write the visible image with inlier keypoints drawn
    pub debug_keypoints: bool,
    pub features: FeatureConfig,
    pub registration: RegistrationConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            input_dir: None,
            output_dir: None,
            alpha: 0.5,
            thermal_suffix: "T".to_string(),
            visible_suffix: "Z".to_string(),
            aligned_suffix: "AT".to_string(),
            extensions: ["jpg", "jpeg", "png", "tif", "tiff"].iter().map(|s| s.to_string()).collect(),
            debug_keypoints: false,
            features: FeatureConfig::default(),
            registration: RegistrationConfig::default(),
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.alpha.is_finite() {
            return Err(invalid("alpha", "must be a finite number"));
        }
        for (field, suffix) in [
            ("thermal_suffix", &self.thermal_suffix),
            ("visible_suffix", &self.visible_suffix),
            ("aligned_suffix", &self.aligned_suffix),
        ] {
            if suffix.is_empty() || suffix.contains('_') {
                return Err(invalid(field, format!("{:?} must be non-empty and contain no '_'", suffix)));
            }
        }
        if self.thermal_suffix == self.visible_suffix {
            return Err(invalid("visible_suffix", "must differ from thermal_suffix"));
        }
        if self.extensions.is_empty() {
            return Err(invalid("extensions", "at least one extension is required"));
        }
        self.features.validate()?;
        self.registration.validate()?;
        Ok(())
    }

    /// Load from a `.toml` or `.json` file, chosen by extension
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match extension(path).as_deref() {
            Some("toml") => Self::from_toml(&content),
            Some("json") => Self::from_json(&content),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// Save to a `.toml` or `.json` file, chosen by extension
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = match extension(path).as_deref() {
            Some("toml") => self.to_toml()?,
            Some("json") => self.to_json()?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}
