//! # Keel Plugin System Errors
//!
//! [`PluginSystemError`] is the typed error for everything the registry does
//! with plugins: reading and validating manifests, mapping entry points to
//! constructors, running lifecycle hooks, and linking dependencies.
use std::path::PathBuf;

use crate::plugin_system::dependency::DependencyError;
use crate::plugin_system::traits::PluginState;
use crate::plugin_system::version::VersionError;

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemError {
    #[error("Plugin manifest error for '{path}': {message}")]
    ManifestError {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Plugin '{plugin_id}' failed validation: {}", .violations.join("; "))]
    SchemaViolation { plugin_id: String, violations: Vec<String> },

    #[error("Plugin registration error for '{plugin_id}': {message}")]
    RegistrationError { plugin_id: String, message: String },

    #[error("Plugin '{plugin_id}' names entry point '{entry_point}' which is not in the catalog")]
    UnknownEntryPoint { plugin_id: String, entry_point: String },

    #[error("Plugin '{plugin_id}' requires engine '{engine}' but the core API is {api_version}")]
    IncompatibleEngine {
        plugin_id: String,
        engine: String,
        api_version: String,
    },

    #[error("Plugin '{plugin_id}' failed in {hook}: {message}")]
    HookFailed {
        plugin_id: String,
        hook: String,
        message: String,
        #[source]
        source: Option<Box<crate::kernel::error::Error>>,
    },

    #[error("Plugin '{plugin_id}' cannot move from {from} to {to}")]
    InvalidStateTransition {
        plugin_id: String,
        from: PluginState,
        to: PluginState,
    },

    #[error("Plugin not found: {0}")]
    NotFound(String),

    #[error("Dependency resolution failed: {0}")]
    DependencyResolution(#[from] DependencyError),

    #[error("Version parsing error: {0}")]
    VersionParsing(#[from] VersionError),
}

impl PluginSystemError {
    /// Name of the plugin the error is about, when known
    pub fn plugin_id(&self) -> Option<&str> {
        match self {
            PluginSystemError::SchemaViolation { plugin_id, .. }
            | PluginSystemError::RegistrationError { plugin_id, .. }
            | PluginSystemError::UnknownEntryPoint { plugin_id, .. }
            | PluginSystemError::IncompatibleEngine { plugin_id, .. }
            | PluginSystemError::HookFailed { plugin_id, .. }
            | PluginSystemError::InvalidStateTransition { plugin_id, .. } => Some(plugin_id),
            PluginSystemError::NotFound(name) => Some(name),
            _ => None,
        }
    }
}
