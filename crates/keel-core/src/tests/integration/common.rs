#![cfg(test)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;

use crate::component::error::ComponentError;
use crate::kernel::error::{Error, Result as KernelResult};
use crate::kernel::lifecycle::{Lifecycle, LifecycleHook};
use crate::plugin_system::catalog::PluginCatalog;
use crate::plugin_system::context::PluginContext;
use crate::plugin_system::loader::ManifestLoader;
use crate::plugin_system::manifest::PluginManifest;
use crate::plugin_system::plugin::RegisteredPlugin;
use crate::plugin_system::registry::PluginRegistry;
use crate::plugin_system::traits::Plugin;

// ===== MOCK PLUGINS =====

/// Shared log of hook invocations, formatted as `<plugin>:<hook>`
pub type Tracker = Arc<StdMutex<Vec<String>>>;

/// Component registration run inside a plugin hook
pub type HookFn = Arc<dyn Fn(&mut PluginContext) -> Result<(), ComponentError> + Send + Sync>;

pub fn tracker() -> Tracker {
    Arc::new(StdMutex::new(Vec::new()))
}

pub fn events(tracker: &Tracker) -> Vec<String> {
    tracker.lock().unwrap().clone()
}

/// Events for one hook only, as plugin names in call order
pub fn calls(tracker: &Tracker, hook: LifecycleHook) -> Vec<String> {
    let suffix = format!(":{}", hook);
    events(tracker)
        .into_iter()
        .filter_map(|e| e.strip_suffix(&suffix).map(str::to_string))
        .collect()
}

/// A plugin that records every hook call and can be told to register
/// components or to fail a given hook.
#[derive(Clone)]
pub struct TestPlugin {
    name: String,
    tracker: Tracker,
    on_initialize: Option<HookFn>,
    on_start: Option<HookFn>,
    fail_on: Option<LifecycleHook>,
}

impl TestPlugin {
    pub fn new(name: &str, tracker: &Tracker) -> Self {
        Self {
            name: name.to_string(),
            tracker: tracker.clone(),
            on_initialize: None,
            on_start: None,
            fail_on: None,
        }
    }

    pub fn on_initialize<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut PluginContext) -> Result<(), ComponentError> + Send + Sync + 'static,
    {
        self.on_initialize = Some(Arc::new(f));
        self
    }

    pub fn on_start<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut PluginContext) -> Result<(), ComponentError> + Send + Sync + 'static,
    {
        self.on_start = Some(Arc::new(f));
        self
    }

    pub fn failing(mut self, hook: LifecycleHook) -> Self {
        self.fail_on = Some(hook);
        self
    }

    fn record(&self, hook: LifecycleHook) -> KernelResult<()> {
        self.tracker.lock().unwrap().push(format!("{}:{}", self.name, hook));
        if self.fail_on == Some(hook) {
            return Err(Error::Other(format!("{} refused to {}", self.name, hook)));
        }
        Ok(())
    }
}

#[async_trait]
impl Lifecycle<PluginContext> for TestPlugin {
    async fn install(&self, _ctx: &mut PluginContext) -> KernelResult<()> {
        self.record(LifecycleHook::Install)
    }

    async fn initialize(&self, ctx: &mut PluginContext) -> KernelResult<()> {
        self.record(LifecycleHook::Initialize)?;
        if let Some(f) = &self.on_initialize {
            f(ctx)?;
        }
        Ok(())
    }

    async fn start(&self, ctx: &mut PluginContext) -> KernelResult<()> {
        self.record(LifecycleHook::Start)?;
        if let Some(f) = &self.on_start {
            f(ctx)?;
        }
        Ok(())
    }

    async fn stop(&self, _ctx: &mut PluginContext) -> KernelResult<()> {
        self.record(LifecycleHook::Stop)
    }
}

impl Plugin for TestPlugin {}

// ===== HELPERS =====

/// Manifest with `main` equal to the plugin name
pub fn manifest(name: &str, version: &str, dependencies: &[(&str, &str)]) -> PluginManifest {
    dependencies
        .iter()
        .fold(PluginManifest::new(name, version, name), |m, (dep, range)| m.with_dependency(dep, range))
}

/// Registry with an empty catalog, for plugins added directly
pub fn registry() -> PluginRegistry {
    PluginRegistry::new(PluginCatalog::new(), ManifestLoader::default())
}

pub async fn add(registry: &mut PluginRegistry, manifest: PluginManifest, plugin: TestPlugin) {
    RegisteredPlugin::register(manifest, registry, Box::new(plugin))
        .await
        .expect("plugin should register");
}

/// Catalog entry building `plugin` for the manifest's `main`
pub fn catalog_with(entries: Vec<(&str, TestPlugin)>) -> PluginCatalog {
    entries.into_iter().fold(PluginCatalog::new(), |catalog, (main, plugin)| {
        catalog.with_entry(main, move |_| Box::new(plugin.clone()) as Box<dyn Plugin>)
    })
}

/// Write `<root>/<dir>/<plugin>/manifest.json`
pub fn write_manifest(root: &Path, dir: &str, plugin: &str, body: &str) -> PathBuf {
    let plugin_dir = root.join(dir).join(plugin);
    fs::create_dir_all(&plugin_dir).expect("create plugin dir");
    let path = plugin_dir.join("manifest.json");
    fs::write(&path, body).expect("write manifest");
    path
}

/// A manifest document carrying the host metadata block
pub fn manifest_json(name: &str, version: &str, dependencies: &[(&str, &str)]) -> String {
    let deps: serde_json::Map<String, serde_json::Value> = dependencies
        .iter()
        .map(|(n, r)| (n.to_string(), serde_json::Value::String(r.to_string())))
        .collect();
    serde_json::json!({
        "name": name,
        "version": version,
        "main": name,
        "keel": { "type": "plugin", "dependencies": deps }
    })
    .to_string()
}
