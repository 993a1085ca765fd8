use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::plugin_system::version::VersionRange;

/// A declared dependency on another plugin. Every declared dependency is
/// required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginDependency {
    /// The name of the required plugin
    pub plugin_name: String,

    /// The version range that is acceptable
    pub version_range: VersionRange,
}

/// Error that can occur when resolving dependencies
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
    /// The required plugin is not registered
    #[error("{plugin} {version} requires {dependency} {range} and it is unavailable.")]
    MissingPlugin {
        plugin: String,
        version: String,
        dependency: String,
        range: String,
    },

    /// The plugin was found, but the version is outside the declared range
    #[error("{plugin} {version} requires {dependency} {range} and version {installed} is installed.")]
    IncompatibleVersion {
        plugin: String,
        version: String,
        dependency: String,
        range: String,
        installed: String,
    },

    /// The dependency is registered but disabled
    #[error("{plugin} requires {dependency} which is disabled.")]
    DisabledDependency { plugin: String, dependency: String },

    /// Dependency cycle detected
    #[error("Circular dependency detected: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    /// Plugins that could not be ordered although no cycle joins them
    #[error("Cannot order plugins with unplaced dependencies: {}", .0.join(", "))]
    UnorderedPlugins(Vec<String>),

    /// Other dependency resolution error
    #[error("Dependency error: {0}")]
    Other(String),
}

impl DependencyError {
    /// Name of the dependency this error is about, if any
    pub fn dependency(&self) -> Option<&str> {
        match self {
            DependencyError::MissingPlugin { dependency, .. }
            | DependencyError::IncompatibleVersion { dependency, .. }
            | DependencyError::DisabledDependency { dependency, .. } => Some(dependency),
            _ => None,
        }
    }
}

impl PluginDependency {
    pub fn new(plugin_name: &str, version_range: VersionRange) -> Self {
        Self {
            plugin_name: plugin_name.to_string(),
            version_range,
        }
    }

    /// Check if this dependency accepts the given version string
    pub fn is_compatible_with(&self, version_str: &str) -> bool {
        self.version_range.includes_str(version_str)
    }
}

impl fmt::Display for PluginDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.plugin_name, self.version_range.constraint_string())
    }
}
