//! Application configuration.
//!
//! [`AppConfig`] tells the [`Application`](crate::kernel::bootstrap::Application)
//! where to look for plugin manifests and how to react to failures. It can be
//! read from JSON, YAML (`yaml-config` feature) or TOML (`toml-config`
//! feature); the format is picked from the file extension.
use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kernel::constants::{APP_NAME, APP_VERSION, DEFAULT_MANIFEST_FILE, DEFAULT_PLUGINS_DIR};
use crate::kernel::lifecycle::{Validate, Validation};

/// Errors raised while reading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported configuration format for '{0}'")]
    UnsupportedFormat(PathBuf),

    #[error("Failed to parse {format} configuration: {message}")]
    Parse { format: ConfigFormat, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file path
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(ConfigFormat::Json),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            #[cfg(feature = "toml-config")]
            "toml" => Some(ConfigFormat::Toml),
            _ => None,
        }
    }

    /// Deserialize `text` in this format
    pub fn parse<T: DeserializeOwned>(&self, text: &str) -> Result<T, ConfigError> {
        let parsed = match self {
            ConfigFormat::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(text).map_err(|e| e.to_string()),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(text).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| ConfigError::Parse { format: *self, message })
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// What the application does when a phase reports failures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log the failure, disable the affected plugins and keep going
    #[default]
    Skip,
    /// Stop startup at the first phase that reports a failure
    Abort,
}

/// Order in which `start()` visits plugins
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartOrder {
    /// Dependencies first, same as initialize
    #[default]
    Priority,
    /// Registration order
    Registration,
}

fn default_name() -> String {
    APP_NAME.to_string()
}

fn default_version() -> String {
    APP_VERSION.to_string()
}

fn default_base_paths() -> Vec<PathBuf> {
    vec![PathBuf::from(".")]
}

fn default_directories() -> Vec<String> {
    vec![DEFAULT_PLUGINS_DIR.to_string()]
}

fn default_manifest_file() -> String {
    DEFAULT_MANIFEST_FILE.to_string()
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    /// Roots searched for plugin directories
    #[serde(default = "default_base_paths")]
    pub base_paths: Vec<PathBuf>,
    /// Plugin directory names looked up under every base path
    #[serde(default = "default_directories")]
    pub directories: Vec<String>,
    /// File name of a plugin manifest
    #[serde(default = "default_manifest_file")]
    pub manifest_file: String,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default)]
    pub start_order: StartOrder,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            version: default_version(),
            base_paths: default_base_paths(),
            directories: default_directories(),
            manifest_file: default_manifest_file(),
            failure_policy: FailurePolicy::default(),
            start_order: StartOrder::default(),
        }
    }
}

impl AppConfig {
    /// Parse configuration text in `format`; missing keys take defaults.
    pub fn from_text(text: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        let config: AppConfig = format.parse(text)?;
        let validation = config.validate();
        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.to_string()));
        }
        Ok(config)
    }

    /// Read configuration from `path`
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;
        let text = tokio::fs::read_to_string(path).await.map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("loaded configuration from {}", path.display());
        Self::from_text(&text, format)
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Validation {
        let mut validation = Validation::new();
        validation
            .require(!self.base_paths.is_empty(), "base_paths must not be empty")
            .require(!self.directories.is_empty(), "directories must not be empty")
            .require(!self.manifest_file.trim().is_empty(), "manifest_file must not be empty");
        validation
    }
}
