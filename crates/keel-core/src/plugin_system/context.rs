//! The context passed to every plugin hook.
use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;

use crate::component::descriptor::{ComponentDescriptor, ComponentValue, FactoryFn, ResolvedDependencies};
use crate::component::error::ComponentError;
use crate::component::injector::ComponentInjector;
use crate::component::registrar::{Registrar, RegistrarHandle};
use crate::config::ConfigFormat;
use crate::kernel::constants::MODULE_INDEX_STEM;
use crate::plugin_system::catalog::ModuleTable;
use crate::plugin_system::manifest::PluginManifest;

/// Everything a plugin hook may touch: the shared injector, the plugin's own
/// manifest and directory, and the host module table. Components registered
/// through the context are owned by the plugin and recorded so the registry
/// can list them.
pub struct PluginContext {
    injector: ComponentInjector,
    manifest: PluginManifest,
    modules: ModuleTable,
    registered: Vec<String>,
}

impl PluginContext {
    pub fn new(injector: ComponentInjector, manifest: PluginManifest, modules: ModuleTable) -> Self {
        Self {
            injector,
            manifest,
            modules,
            registered: Vec::new(),
        }
    }

    pub fn plugin_name(&self) -> &str {
        &self.manifest.name
    }

    pub fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.manifest.base_dir.as_deref()
    }

    pub fn injector(&self) -> &ComponentInjector {
        &self.injector
    }

    /// Names of the components this context registered, in order
    pub fn registered(&self) -> &[String] {
        &self.registered
    }

    pub(crate) fn take_registered(&mut self) -> Vec<String> {
        std::mem::take(&mut self.registered)
    }

    /// Register `descriptor` as owned by this plugin
    pub fn register(&mut self, descriptor: ComponentDescriptor) -> Result<(), ComponentError> {
        let descriptor = descriptor.owned_by(&self.manifest.name);
        let name = descriptor.name.clone();
        self.injector.register(descriptor)?;
        self.registered.push(name);
        Ok(())
    }

    /// Register a fixed value
    pub fn value<T: Any + Send + Sync>(&mut self, name: &str, value: T) -> Result<(), ComponentError> {
        self.register(ComponentDescriptor::value(name, value))
    }

    /// Register a factory resolved from the named components, in order
    pub fn factory<T, I, S, F>(&mut self, name: &str, dependencies: I, factory: F) -> Result<(), ComponentError>
    where
        T: Any + Send + Sync,
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&ResolvedDependencies) -> Result<T, ComponentError> + Send + Sync + 'static,
    {
        self.register(ComponentDescriptor::factory(name, dependencies, factory))
    }

    /// Import host modules, each `(alias, module)` pair registering module
    /// `module` as component `alias`.
    pub fn require(&mut self, imports: &[(&str, &str)]) -> Result<(), ComponentError> {
        for (alias, module) in imports {
            let loader = self
                .modules
                .get(module)
                .ok_or_else(|| ComponentError::UnknownModule(module.to_string()))?;
            debug!("{} requires module '{}' as '{}'", self.manifest.name, module, alias);
            self.register(ComponentDescriptor::module_from(alias, loader))?;
        }
        Ok(())
    }

    /// Register every document in `<plugin dir>/<name>/` as a module
    /// component named after the file stem. Files that are not JSON, YAML or
    /// TOML and `index.*` files are ignored. Documents are parsed on first
    /// use. Returns the registered names, sorted.
    pub async fn directory(&mut self, name: &str) -> Result<Vec<String>, ComponentError> {
        let base_dir = self.base_dir().ok_or_else(|| ComponentError::NoBaseDirectory {
            plugin: self.manifest.name.clone(),
        })?;
        let dir = base_dir.join(name);
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|source| ComponentError::ModuleDirectory { path: dir.clone(), source })?;

        let mut files: Vec<PathBuf> = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| ComponentError::ModuleDirectory { path: dir.clone(), source })?
        {
            let path = entry.path();
            if path.is_file() && ConfigFormat::from_path(&path).is_some() {
                files.push(path);
            }
        }
        files.sort();

        let mut names = Vec::new();
        for path in files {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            if stem == MODULE_INDEX_STEM {
                continue;
            }
            self.register(ComponentDescriptor::module_from(&stem, document_loader(&stem, path)))?;
            names.push(stem);
        }
        debug!("{} registered {} module(s) from {}", self.manifest.name, names.len(), dir.display());
        Ok(names)
    }

    /// Resolve a component from the shared injector
    pub fn component(&self, name: &str) -> Result<ComponentValue, ComponentError> {
        self.injector.get(name)
    }

    /// Resolve a component and downcast it to `T`
    pub fn component_as<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, ComponentError> {
        self.injector.get_as::<T>(name)
    }

    /// Look up a registrar published by another plugin
    pub fn registrar(&self, name: &str) -> Result<Arc<RegistrarHandle>, ComponentError> {
        self.injector.get_as::<RegistrarHandle>(name)
    }

    /// Publish `registrar` as component `name`
    pub fn provide_registrar<R: Registrar + 'static>(&mut self, name: &str, registrar: R) -> Result<(), ComponentError> {
        self.value(name, RegistrarHandle::new(registrar))
    }

    /// Register `descriptor` through the registrar published as `registrar`
    pub fn register_with(&mut self, registrar: &str, descriptor: ComponentDescriptor) -> Result<(), ComponentError> {
        let handle = self.registrar(registrar)?;
        let descriptor = descriptor.owned_by(&self.manifest.name);
        let name = descriptor.name.clone();
        handle.register(&self.injector, descriptor)?;
        self.registered.push(name);
        Ok(())
    }
}

fn document_loader(name: &str, path: PathBuf) -> FactoryFn {
    let name = name.to_string();
    Arc::new(move |_: &ResolvedDependencies| {
        let format = ConfigFormat::from_path(&path)
            .ok_or_else(|| ComponentError::factory(&name, format!("unsupported module file {}", path.display())))?;
        let text = std::fs::read_to_string(&path).map_err(|e| ComponentError::FactoryFailed {
            name: name.clone(),
            message: format!("failed to read {}", path.display()),
            source: Some(Box::new(e)),
        })?;
        let document: serde_json::Value = format.parse(&text).map_err(|e| ComponentError::FactoryFailed {
            name: name.clone(),
            message: format!("failed to parse {}", path.display()),
            source: Some(Box::new(e)),
        })?;
        Ok(Arc::new(document) as ComponentValue)
    })
}
