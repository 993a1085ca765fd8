//! Statically linked plugin code.
//!
//! Manifests name their code through `main`. Instead of loading that code
//! at runtime, the host fills a [`PluginCatalog`] at startup with one
//! constructor per entry point, and the registry looks the constructor up
//! when it registers a manifest.
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::component::descriptor::{ComponentValue, FactoryFn, ResolvedDependencies};
use crate::component::error::ComponentError;
use crate::plugin_system::manifest::PluginManifest;
use crate::plugin_system::traits::Plugin;

/// Builds a plugin instance for a manifest
pub type PluginConstructor = Arc<dyn Fn(&PluginManifest) -> Box<dyn Plugin> + Send + Sync>;

/// Host-provided capabilities that plugins import by name with
/// [`PluginContext::require`](crate::plugin_system::PluginContext::require).
#[derive(Clone, Default)]
pub struct ModuleTable {
    loaders: HashMap<String, FactoryFn>,
}

impl ModuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module produced by `loader` on first use
    pub fn insert<T, F>(&mut self, name: &str, loader: F)
    where
        T: Any + Send + Sync,
        F: Fn() -> Result<T, ComponentError> + Send + Sync + 'static,
    {
        let loader: FactoryFn =
            Arc::new(move |_: &ResolvedDependencies| loader().map(|value| Arc::new(value) as ComponentValue));
        self.loaders.insert(name.to_string(), loader);
    }

    pub fn get(&self, name: &str) -> Option<FactoryFn> {
        self.loaders.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.loaders.contains_key(name)
    }

    /// Module names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.loaders.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for ModuleTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleTable").field("modules", &self.names()).finish()
    }
}

/// Entry point table plus the module table handed to plugins
#[derive(Clone, Default)]
pub struct PluginCatalog {
    entries: HashMap<String, PluginConstructor>,
    modules: ModuleTable,
}

fn normalize(entry_point: &str) -> &str {
    entry_point.trim().trim_start_matches("./")
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `entry_point` to a constructor
    pub fn insert<F>(&mut self, entry_point: &str, constructor: F)
    where
        F: Fn(&PluginManifest) -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        self.entries.insert(normalize(entry_point).to_string(), Arc::new(constructor));
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with_entry<F>(mut self, entry_point: &str, constructor: F) -> Self
    where
        F: Fn(&PluginManifest) -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        self.insert(entry_point, constructor);
        self
    }

    /// Builder form of [`ModuleTable::insert`]
    pub fn with_module<T, F>(mut self, name: &str, loader: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> Result<T, ComponentError> + Send + Sync + 'static,
    {
        self.modules.insert(name, loader);
        self
    }

    /// Merge every entry and module of `other` into this catalog
    pub fn extend(&mut self, other: PluginCatalog) {
        self.entries.extend(other.entries);
        self.modules.loaders.extend(other.modules.loaders);
    }

    pub fn contains(&self, entry_point: &str) -> bool {
        self.entries.contains_key(normalize(entry_point))
    }

    /// Build the plugin named by the manifest's `main`
    pub fn construct(&self, manifest: &PluginManifest) -> Option<Box<dyn Plugin>> {
        self.entries
            .get(normalize(&manifest.main))
            .map(|constructor| constructor(manifest))
    }

    /// Known entry points, sorted
    pub fn entry_points(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn modules(&self) -> &ModuleTable {
        &self.modules
    }

    pub fn modules_mut(&mut self) -> &mut ModuleTable {
        &mut self.modules
    }
}

impl fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCatalog")
            .field("entries", &self.entry_points())
            .field("modules", &self.modules)
            .finish()
    }
}
