//! A plugin as the registry holds it: manifest, code, links and state.
use std::fmt;

use log::{debug, warn};

use crate::component::injector::ComponentInjector;
use crate::kernel::constants::API_VERSION;
use crate::kernel::lifecycle::{LifecycleHook, LifecycleId, Validate};
use crate::plugin_system::catalog::ModuleTable;
use crate::plugin_system::context::PluginContext;
use crate::plugin_system::dependency::DependencyError;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::handle::PluginSummary;
use crate::plugin_system::manifest::PluginManifest;
use crate::plugin_system::registry::PluginRegistry;
use crate::plugin_system::traits::{Plugin, PluginState};

pub struct RegisteredPlugin {
    id: LifecycleId,
    manifest: PluginManifest,
    plugin: Box<dyn Plugin>,
    pub(crate) dependencies: Vec<String>,
    pub(crate) dependents: Vec<String>,
    pub(crate) components: Vec<String>,
    state: PluginState,
    hooked: bool,
}

impl RegisteredPlugin {
    /// Wrap `plugin` with its manifest. No validation and no side effects.
    pub fn create(manifest: PluginManifest, plugin: Box<dyn Plugin>) -> Self {
        Self {
            id: LifecycleId::new(),
            manifest,
            plugin,
            dependencies: Vec::new(),
            dependents: Vec::new(),
            components: Vec::new(),
            state: PluginState::Initialized,
            hooked: false,
        }
    }

    /// Create, validate and add a plugin to `registry`.
    ///
    /// Validation covers the manifest shape and the engine range against
    /// the core API version. An invalid plugin is logged and not added.
    pub async fn register(
        manifest: PluginManifest,
        registry: &mut PluginRegistry,
        plugin: Box<dyn Plugin>,
    ) -> Result<(), PluginSystemError> {
        let entry = Self::create(manifest, plugin);
        if let Err(e) = entry.check() {
            warn!("refusing to register {}: {}", entry.name(), e);
            return Err(e);
        }
        registry.add(entry).await
    }

    fn check(&self) -> Result<(), PluginSystemError> {
        let validation = self.manifest.validate();
        if !validation.is_valid() {
            return Err(PluginSystemError::SchemaViolation {
                plugin_id: self.manifest.name.clone(),
                violations: validation.into_violations(),
            });
        }
        if !self.manifest.supports_engine(API_VERSION)? {
            return Err(PluginSystemError::IncompatibleEngine {
                plugin_id: self.manifest.name.clone(),
                engine: self.manifest.engine.clone(),
                api_version: API_VERSION.to_string(),
            });
        }
        Ok(())
    }

    /// Check every declared dependency against `registry`.
    ///
    /// On success returns the dependency names to link, in declared order.
    /// Otherwise returns every problem found, not just the first.
    pub async fn resolve(&self, registry: &PluginRegistry) -> Result<Vec<String>, Vec<DependencyError>> {
        let mut links = Vec::new();
        let mut errors = Vec::new();

        let declared = match self.manifest.dependency_list() {
            Ok(declared) => declared,
            Err(e) => return Err(vec![DependencyError::Other(format!("{}: {}", self.name(), e))]),
        };

        for dependency in &declared {
            debug!("{} requires {}", self.name(), dependency);
            let name = &dependency.plugin_name;
            let constraint = dependency.version_range.constraint_string();
            let Some(installed) = registry.get(name) else {
                errors.push(DependencyError::MissingPlugin {
                    plugin: self.name().to_string(),
                    version: self.version().to_string(),
                    dependency: name.clone(),
                    range: constraint.to_string(),
                });
                continue;
            };
            if !dependency.is_compatible_with(installed.version()) {
                errors.push(DependencyError::IncompatibleVersion {
                    plugin: self.name().to_string(),
                    version: self.version().to_string(),
                    dependency: name.clone(),
                    range: constraint.to_string(),
                    installed: installed.version().to_string(),
                });
                continue;
            }
            if registry.is_switched_off(name) {
                errors.push(DependencyError::DisabledDependency {
                    plugin: self.name().to_string(),
                    dependency: name.clone(),
                });
                continue;
            }
            links.push(name.clone());
        }

        if errors.is_empty() {
            debug!("{} resolved {} dependency(ies)", self.name(), links.len());
            Ok(links)
        } else {
            Err(errors)
        }
    }

    /// Run `hook` with a fresh context. Components registered during the
    /// hook are recorded even when the hook fails.
    pub(crate) async fn invoke(
        &mut self,
        hook: LifecycleHook,
        injector: &ComponentInjector,
        modules: &ModuleTable,
    ) -> Result<(), PluginSystemError> {
        debug!("{} {}", hook, self.name());
        let mut ctx = PluginContext::new(injector.clone(), self.manifest.clone(), modules.clone());
        let outcome = hook.invoke(self.plugin.as_ref(), &mut ctx).await;
        self.components.extend(ctx.take_registered());
        if hook == LifecycleHook::Initialize && outcome.is_ok() {
            self.hooked = true;
        }
        outcome.map_err(|e| PluginSystemError::HookFailed {
            plugin_id: self.name().to_string(),
            hook: hook.to_string(),
            message: e.to_string(),
            source: Some(Box::new(e)),
        })
    }

    /// Move to `next`, refusing transitions the pipeline does not allow
    pub(crate) fn transition(&mut self, next: PluginState) -> Result<(), PluginSystemError> {
        if !self.state.can_transition_to(next) {
            return Err(PluginSystemError::InvalidStateTransition {
                plugin_id: self.name().to_string(),
                from: self.state,
                to: next,
            });
        }
        if self.state != next {
            debug!("{}: {} -> {}", self.name(), self.state, next);
        }
        self.state = next;
        Ok(())
    }

    pub fn id(&self) -> LifecycleId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn version(&self) -> &str {
        &self.manifest.version
    }

    pub fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    pub fn plugin(&self) -> &dyn Plugin {
        self.plugin.as_ref()
    }

    pub fn state(&self) -> PluginState {
        self.state
    }

    /// Whether the initialize hook has completed
    pub fn is_initialized(&self) -> bool {
        self.hooked
    }

    /// Names of the plugins this one depends on (filled by resolve)
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Names of the plugins depending on this one (filled by resolve)
    pub fn dependents(&self) -> &[String] {
        &self.dependents
    }

    /// Names of the components this plugin registered
    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn summary(&self) -> PluginSummary {
        PluginSummary {
            id: self.id,
            name: self.manifest.name.clone(),
            version: self.manifest.version.clone(),
            kind: self.manifest.kind,
            state: self.state,
            dependencies: self.dependencies.clone(),
            dependents: self.dependents.clone(),
            components: self.components.clone(),
        }
    }
}

impl fmt::Debug for RegisteredPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredPlugin")
            .field("id", &self.id)
            .field("name", &self.manifest.name)
            .field("version", &self.manifest.version)
            .field("state", &self.state)
            .field("dependencies", &self.dependencies)
            .field("dependents", &self.dependents)
            .field("components", &self.components)
            .finish()
    }
}
