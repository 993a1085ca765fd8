//! Plugin manifests.
//!
//! A manifest is a JSON document next to the plugin's files. Only documents
//! carrying the `keel` metadata block are plugins for this host; everything
//! else found by discovery is skipped.
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::kernel::constants::DEFAULT_ENGINE_RANGE;
use crate::kernel::lifecycle::{Validate, Validation};
use crate::plugin_system::dependency::PluginDependency;
use crate::plugin_system::version::{parse_version, VersionError, VersionRange};

/// Role a plugin plays in the host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    Host,
    Extension,
    #[default]
    Plugin,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginKind::Host => write!(f, "host"),
            PluginKind::Extension => write!(f, "extension"),
            PluginKind::Plugin => write!(f, "plugin"),
        }
    }
}

/// When the host expects the plugin to be loaded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadPolicy {
    Eager,
    #[default]
    Lazy,
}

fn default_engine() -> String {
    DEFAULT_ENGINE_RANGE.to_string()
}

fn default_true() -> bool {
    true
}

/// The host-specific block of a manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeMetadata {
    #[serde(rename = "type", default)]
    pub kind: PluginKind,
    #[serde(default = "default_engine")]
    pub engine: String,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<serde_json::Value>,
}

impl Default for RuntimeMetadata {
    fn default() -> Self {
        Self {
            kind: PluginKind::default(),
            engine: default_engine(),
            dependencies: BTreeMap::new(),
            credentials: None,
        }
    }
}

/// On-disk shape of a manifest
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ManifestDocument {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub main: String,
    #[serde(rename = "keel", default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<RuntimeMetadata>,
    #[serde(default)]
    pub policy: LoadPolicy,
    #[serde(default)]
    pub auto: bool,
    #[serde(default = "default_true")]
    pub mortal: bool,
}

/// Represents a plugin manifest that describes a plugin
#[derive(Debug, Clone, PartialEq)]
pub struct PluginManifest {
    /// Unique name within a registry
    pub name: String,
    /// Plugin version (semantic version)
    pub version: String,
    /// Entry point locator, looked up in the plugin catalog
    pub main: String,
    pub kind: PluginKind,
    /// Range of core API versions the plugin supports
    pub engine: String,
    /// Declared dependencies, name to version range
    pub dependencies: BTreeMap<String, String>,
    pub credentials: Option<serde_json::Value>,
    pub policy: LoadPolicy,
    pub auto: bool,
    pub mortal: bool,
    /// Directory the manifest was loaded from
    pub base_dir: Option<PathBuf>,
}

impl PluginManifest {
    /// Create a new plugin manifest
    pub fn new(name: &str, version: &str, main: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            main: main.to_string(),
            kind: PluginKind::default(),
            engine: default_engine(),
            dependencies: BTreeMap::new(),
            credentials: None,
            policy: LoadPolicy::default(),
            auto: false,
            mortal: true,
            base_dir: None,
        }
    }

    /// Build a manifest from a parsed document. Returns `None` when the
    /// document has no `keel` block.
    pub fn from_document(document: ManifestDocument, base_dir: Option<&Path>) -> Option<Self> {
        let runtime = document.runtime?;
        Some(Self {
            name: document.name,
            version: document.version,
            main: document.main,
            kind: runtime.kind,
            engine: runtime.engine,
            dependencies: runtime.dependencies,
            credentials: runtime.credentials,
            policy: document.policy,
            auto: document.auto,
            mortal: document.mortal,
            base_dir: base_dir.map(Path::to_path_buf),
        })
    }

    /// Add a dependency
    pub fn with_dependency(mut self, name: &str, range: &str) -> Self {
        self.dependencies.insert(name.to_string(), range.to_string());
        self
    }

    pub fn with_kind(mut self, kind: PluginKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_engine(mut self, engine: &str) -> Self {
        self.engine = engine.to_string();
        self
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// Declared dependencies with their ranges parsed
    pub fn dependency_list(&self) -> Result<Vec<PluginDependency>, VersionError> {
        self.dependencies
            .iter()
            .map(|(name, range)| Ok(PluginDependency::new(name, VersionRange::from_constraint(range)?)))
            .collect()
    }

    /// Whether `api_version` falls inside the declared engine range
    pub fn supports_engine(&self, api_version: &str) -> Result<bool, VersionError> {
        let range = VersionRange::from_constraint(&self.engine)?;
        Ok(range.includes(&parse_version(api_version)?))
    }
}

impl Validate for PluginManifest {
    fn validate(&self) -> Validation {
        let mut validation = Validation::new();
        validation.require(!self.name.trim().is_empty(), "name must not be empty");
        if let Err(e) = parse_version(&self.version) {
            validation.push(format!("version: {}", e));
        }
        validation.require(!self.main.trim().is_empty(), "main must not be empty");
        if let Err(e) = VersionRange::from_constraint(&self.engine) {
            validation.push(format!("engine: {}", e));
        }
        for (name, range) in &self.dependencies {
            validation.require(!name.trim().is_empty(), "dependency names must not be empty");
            if let Err(e) = VersionRange::from_constraint(range) {
                validation.push(format!("dependencies.{}: {}", name, e));
            }
        }
        validation
    }
}
