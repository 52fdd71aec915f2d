//! Configuration file handling for camkit.
//!
//! Loads capture defaults from `~/.config/camkit/config.toml` or a custom
//! path. Every key is optional; a missing file yields the same values as an
//! empty one.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::types::{AudioSettings, CameraPosition, ResolutionPreset, VideoOrientation};

/// Capture defaults loaded at startup.
///
/// These seed a fresh controller; everything here can still be changed at
/// runtime through the controller's setters.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct CaptureConfig {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub audio: AudioSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CameraConfig {
    #[serde(default)]
    pub position: CameraPosition,
    #[serde(default)]
    pub preset: ResolutionPreset,
    #[serde(default)]
    pub orientation: VideoOrientation,
    /// Mirror frames from the front camera so previews match a mirror.
    #[serde(default = "default_true")]
    pub mirror_front: bool,
}

// Keeps `CameraConfig::default()` in agreement with deserializing an
// empty `[camera]` table.
impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: CameraPosition::default(),
            preset: ResolutionPreset::default(),
            orientation: VideoOrientation::default(),
            mirror_front: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl CaptureConfig {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
                path: path.clone(),
                source: e,
            })?;
            let config: CaptureConfig =
                toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                    path: path.clone(),
                    source: e,
                })?;
            Ok(config)
        } else {
            Ok(CaptureConfig::default())
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError { path, source } => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::ParseError { path, source } => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    source
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
        }
    }
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("camkit").join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/camkit/config.toml")
        })
}
