//! The plugin registry and its phase pipeline.
//!
//! Phases are driven in order by the owning application:
//! `discover` → `register` → `resolve` → `prioritize` → `initialize` →
//! `start` → `stop`. Each phase finishes all of its per-plugin work before it
//! returns. `resolve` fans out one future per plugin and joins them.
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;

use futures::future::join_all;
use log::{debug, error, info, warn};

use crate::component::injector::ComponentInjector;
use crate::config::StartOrder;
use crate::kernel::error::KernelLifecyclePhase;
use crate::kernel::lifecycle::{LifecycleHook, LifecycleId, Validate, Validation};
use crate::plugin_system::catalog::PluginCatalog;
use crate::plugin_system::dependency::DependencyError;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::handle::RegistryHandle;
use crate::plugin_system::loader::{load_manifest, ManifestLoader};
use crate::plugin_system::plugin::RegisteredPlugin;
use crate::plugin_system::report::{ManifestFailure, PhaseReport, RegistrationReport, ResolutionReport};
use crate::plugin_system::traits::PluginState;

/// Registry for managing plugins
pub struct PluginRegistry {
    id: LifecycleId,
    plugins: HashMap<String, RegisteredPlugin>,
    /// Plugin names in registration order
    order: Vec<String>,
    injector: ComponentInjector,
    handle: RegistryHandle,
    catalog: PluginCatalog,
    loader: ManifestLoader,
    registered_paths: BTreeSet<PathBuf>,
    unregistered: BTreeSet<PathBuf>,
    prioritized: Vec<String>,
    /// Plugins in the order they were started, for reverse teardown
    started: Vec<String>,
    /// Plugins switched off by the host
    switched_off: HashSet<String>,
    start_order: StartOrder,
}

impl PluginRegistry {
    /// Create a registry over `catalog`, discovering manifests with `loader`
    pub fn new(catalog: PluginCatalog, loader: ManifestLoader) -> Self {
        let handle = RegistryHandle::new();
        let injector = ComponentInjector::new(handle.clone());
        Self {
            id: LifecycleId::new(),
            plugins: HashMap::new(),
            order: Vec::new(),
            injector,
            handle,
            catalog,
            loader,
            registered_paths: BTreeSet::new(),
            unregistered: BTreeSet::new(),
            prioritized: Vec::new(),
            started: Vec::new(),
            switched_off: HashSet::new(),
            start_order: StartOrder::default(),
        }
    }

    pub fn set_start_order(&mut self, start_order: StartOrder) {
        self.start_order = start_order;
    }

    /// Find manifests not processed by an earlier `register()`.
    pub async fn discover(&mut self) -> Vec<PathBuf> {
        let found = self.loader.discover().await;
        self.unregistered = found.difference(&self.registered_paths).cloned().collect();
        info!(
            "Discovered {} manifest(s), {} new",
            found.len(),
            self.unregistered.len()
        );
        self.unregistered.iter().cloned().collect()
    }

    /// Load every newly discovered manifest and register the plugins it
    /// describes. Each processed path is remembered and never reconsidered.
    pub async fn register(&mut self) -> RegistrationReport {
        let mut report = RegistrationReport::default();
        let pending = std::mem::take(&mut self.unregistered);

        for path in pending {
            self.registered_paths.insert(path.clone());

            let manifest = match load_manifest(&path).await {
                Ok(Some(manifest)) => manifest,
                Ok(None) => {
                    debug!("{} is not a plugin manifest, skipping", path.display());
                    report.skipped.push(path);
                    continue;
                }
                Err(error) => {
                    warn!("{}", error);
                    report.failed.push(ManifestFailure { path, error });
                    continue;
                }
            };

            let Some(plugin) = self.catalog.construct(&manifest) else {
                let error = PluginSystemError::UnknownEntryPoint {
                    plugin_id: manifest.name.clone(),
                    entry_point: manifest.main.clone(),
                };
                warn!("{}", error);
                report.failed.push(ManifestFailure { path, error });
                continue;
            };

            let name = manifest.name.clone();
            match RegisteredPlugin::register(manifest, self, plugin).await {
                Ok(()) => report.registered.push(name),
                Err(error) => report.failed.push(ManifestFailure { path, error }),
            }
        }

        info!(
            "Registered {} plugin(s), skipped {}, failed {}",
            report.registered.len(),
            report.skipped.len(),
            report.failed.len()
        );
        report
    }

    /// Add a plugin under its manifest name and run its install hook.
    ///
    /// A plugin with the same name is replaced; the new plugin keeps the
    /// old one's position in registration order.
    pub async fn add(&mut self, mut plugin: RegisteredPlugin) -> Result<(), PluginSystemError> {
        plugin
            .invoke(LifecycleHook::Install, &self.injector, self.catalog.modules())
            .await?;

        let name = plugin.name().to_string();
        if self.plugins.contains_key(&name) {
            warn!("Plugin {} is already registered, replacing it", name);
        } else {
            self.order.push(name.clone());
        }
        self.handle.publish(plugin.summary());
        self.plugins.insert(name.clone(), plugin);
        debug!("Added plugin {}", name);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredPlugin> {
        self.plugins.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Plugins in registration order
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredPlugin> {
        self.order.iter().filter_map(|name| self.plugins.get(name))
    }

    /// Plugin names in registration order
    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether the host switched `name` off with [`disable`](Self::disable)
    pub fn is_switched_off(&self, name: &str) -> bool {
        self.switched_off.contains(name)
    }

    fn set_state(&mut self, name: &str, state: PluginState) -> Result<(), PluginSystemError> {
        let plugin = self
            .plugins
            .get_mut(name)
            .ok_or_else(|| PluginSystemError::NotFound(name.to_string()))?;
        plugin.transition(state)?;
        self.handle.publish(plugin.summary());
        Ok(())
    }

    fn publish(&self, name: &str) {
        if let Some(plugin) = self.plugins.get(name) {
            self.handle.publish(plugin.summary());
        }
    }

    /// Check every plugin that has not started yet against the registry
    /// and link the ones whose dependencies are satisfied.
    ///
    /// Plugins are resolved independently: one plugin's failure does not
    /// affect any other's outcome here. Failed plugins become `DISABLED`.
    pub async fn resolve(&mut self) -> ResolutionReport {
        let candidates: Vec<String> = self
            .order
            .iter()
            .filter(|name| {
                self.plugins.get(*name).is_some_and(|p| {
                    matches!(
                        p.state(),
                        PluginState::Initialized | PluginState::Enabled | PluginState::Disabled
                    )
                })
            })
            .cloned()
            .collect();

        let candidate_set: HashSet<&String> = candidates.iter().collect();
        for plugin in self.plugins.values_mut() {
            if candidate_set.contains(&plugin.name().to_string()) {
                plugin.dependencies.clear();
            }
            plugin.dependents.retain(|name| !candidate_set.contains(name));
        }

        let mut report = ResolutionReport::default();
        let (switched_off, to_resolve): (Vec<String>, Vec<String>) = candidates
            .into_iter()
            .partition(|name| self.switched_off.contains(name));

        for name in &switched_off {
            if let Err(e) = self.set_state(name, PluginState::Disabled) {
                warn!("{}", e);
            }
        }

        let outcomes = {
            let registry = &*self;
            join_all(to_resolve.iter().filter_map(|name| registry.plugins.get(name)).map(
                |plugin| async move { (plugin.name().to_string(), plugin.resolve(registry).await) },
            ))
            .await
        };

        for (name, outcome) in outcomes {
            match outcome {
                Ok(links) => {
                    for dependency in &links {
                        if let Some(target) = self.plugins.get_mut(dependency) {
                            if !target.dependents.contains(&name) {
                                target.dependents.push(name.clone());
                            }
                        }
                    }
                    if let Some(plugin) = self.plugins.get_mut(&name) {
                        plugin.dependencies = links;
                    }
                    if let Err(e) = self.set_state(&name, PluginState::Enabled) {
                        warn!("{}", e);
                    }
                    report.resolved.push(name);
                }
                Err(errors) => {
                    for e in &errors {
                        warn!("{}", e);
                    }
                    if let Err(e) = self.set_state(&name, PluginState::Disabled) {
                        warn!("{}", e);
                    }
                    report.failed.push((name, errors));
                }
            }
        }

        for name in self.order.clone() {
            self.publish(&name);
        }
        info!(
            "Resolved {} plugin(s), {} failed",
            report.resolved.len(),
            report.failed.len()
        );
        report
    }

    /// Order the active plugins so that every plugin comes after all of
    /// its dependencies.
    ///
    /// Plugins depending (directly or not) on a plugin that cannot be
    /// ordered, because it is disabled or waiting for `resolve()`, are
    /// disabled first. Each pass over the remaining plugins must place at
    /// least one of them; a pass that places none means the rest form a
    /// cycle.
    pub fn prioritize(&mut self) -> Result<Vec<String>, DependencyError> {
        self.cascade_disabled();

        let mut remaining: Vec<String> = self
            .order
            .iter()
            .filter(|name| self.plugins.get(*name).is_some_and(|p| is_orderable(p.state())))
            .cloned()
            .collect();
        let mut ordered: Vec<String> = Vec::with_capacity(remaining.len());
        let mut placed: HashSet<String> = HashSet::new();

        let passes = remaining.len();
        for _ in 0..=passes {
            if remaining.is_empty() {
                break;
            }
            let before = remaining.len();
            remaining.retain(|name| {
                let ready = self
                    .plugins
                    .get(name)
                    .is_some_and(|p| p.dependencies().iter().all(|d| placed.contains(d)));
                if ready {
                    placed.insert(name.clone());
                    ordered.push(name.clone());
                }
                !ready
            });
            if remaining.len() == before {
                return Err(match self.find_cycle(&remaining) {
                    Some(cycle) => {
                        error!("Cannot prioritize plugins: {}", cycle.join(" -> "));
                        DependencyError::CyclicDependency(cycle)
                    }
                    None => {
                        error!("Cannot prioritize plugins: {}", remaining.join(", "));
                        DependencyError::UnorderedPlugins(remaining)
                    }
                });
            }
        }

        info!("Priority order: {}", ordered.join(", "));
        self.prioritized = ordered.clone();
        Ok(ordered)
    }

    /// Disable every enabled plugin linked to a plugin that cannot be
    /// ordered, repeating until nothing changes.
    fn cascade_disabled(&mut self) {
        let mut unavailable: HashSet<String> = self
            .plugins
            .values()
            .filter(|p| !is_orderable(p.state()))
            .map(|p| p.name().to_string())
            .collect();

        loop {
            let newly: Vec<(String, String)> = self
                .order
                .iter()
                .filter(|name| !unavailable.contains(*name))
                .filter_map(|name| {
                    let plugin = self.plugins.get(name).filter(|p| p.state() == PluginState::Enabled)?;
                    let dependency = plugin
                        .dependencies()
                        .iter()
                        .find(|d| unavailable.contains(*d) || !self.plugins.contains_key(*d))?;
                    Some((name.clone(), dependency.clone()))
                })
                .collect();
            if newly.is_empty() {
                break;
            }
            for (name, dependency) in newly {
                let state = self.plugins.get(&dependency).map(|p| p.state());
                warn!(
                    "Disabling {} because dependency {} is {}",
                    name,
                    dependency,
                    state.map_or_else(|| "missing".to_string(), |s| s.to_string())
                );
                if let Err(e) = self.set_state(&name, PluginState::Disabled) {
                    warn!("{}", e);
                }
                unavailable.insert(name);
            }
        }
    }

    /// A dependency path among `remaining` that returns to its start, or
    /// `None` when the walk reaches a plugin with no pending dependency.
    fn find_cycle(&self, remaining: &[String]) -> Option<Vec<String>> {
        let pending: HashSet<&str> = remaining.iter().map(String::as_str).collect();
        let start = remaining.first()?;
        let mut path: Vec<String> = vec![start.clone()];
        let mut current = start.as_str();
        for _ in 0..=pending.len() {
            let next = self
                .plugins
                .get(current)
                .and_then(|p| p.dependencies().iter().find(|d| pending.contains(d.as_str())))?;
            if let Some(pos) = path.iter().position(|n| n == next) {
                let mut cycle = path.split_off(pos);
                cycle.push(next.clone());
                return Some(cycle);
            }
            path.push(next.clone());
            current = next.as_str();
        }
        None
    }

    /// The order computed by the last successful `prioritize()`
    pub fn prioritized(&self) -> &[String] {
        &self.prioritized
    }

    /// Run every enabled plugin's `initialize` hook in priority order.
    ///
    /// A plugin whose initialize fails is disabled, and so is every plugin
    /// depending on it that has not been initialized yet.
    pub async fn initialize(&mut self) -> PhaseReport {
        let mut report = PhaseReport::new(KernelLifecyclePhase::Initialize);
        let mut failed: HashSet<String> = HashSet::new();

        for name in self.prioritized.clone() {
            let Some(plugin) = self.plugins.get(&name) else {
                continue;
            };
            if plugin.state() != PluginState::Enabled || plugin.is_initialized() {
                report.skipped.push(name);
                continue;
            }
            if let Some(dependency) = plugin.dependencies().iter().find(|d| failed.contains(*d)).cloned() {
                let error = PluginSystemError::DependencyResolution(DependencyError::DisabledDependency {
                    plugin: name.clone(),
                    dependency,
                });
                warn!("{}", error);
                if let Err(e) = self.set_state(&name, PluginState::Disabled) {
                    warn!("{}", e);
                }
                failed.insert(name.clone());
                report.fail(&name, error);
                continue;
            }

            let outcome = match self.plugins.get_mut(&name) {
                Some(plugin) => {
                    plugin
                        .invoke(LifecycleHook::Initialize, &self.injector, self.catalog.modules())
                        .await
                }
                None => continue,
            };
            match outcome {
                Ok(()) => {
                    self.publish(&name);
                    report.succeeded.push(name);
                }
                Err(error) => {
                    error!("{}", error);
                    if let Err(e) = self.set_state(&name, PluginState::Disabled) {
                        warn!("{}", e);
                    }
                    failed.insert(name.clone());
                    report.fail(&name, error);
                }
            }
        }

        info!("{}", report);
        report
    }

    /// Run `start` on every initialized plugin, in priority order or in
    /// registration order depending on the configured [`StartOrder`].
    pub async fn start(&mut self) -> PhaseReport {
        let mut report = PhaseReport::new(KernelLifecyclePhase::Start);
        let sequence: Vec<String> = match self.start_order {
            StartOrder::Priority => self.prioritized.clone(),
            StartOrder::Registration => {
                let active: HashSet<&String> = self.prioritized.iter().collect();
                self.order.iter().filter(|n| active.contains(n)).cloned().collect()
            }
        };

        for name in sequence {
            let Some(plugin) = self.plugins.get(&name) else {
                continue;
            };
            let ready = match plugin.state() {
                PluginState::Enabled => plugin.is_initialized(),
                PluginState::Stopped => true,
                _ => false,
            };
            if !ready {
                debug!("Not starting {} ({})", name, plugin.state());
                report.skipped.push(name);
                continue;
            }

            let outcome = match self.plugins.get_mut(&name) {
                Some(plugin) => {
                    plugin
                        .invoke(LifecycleHook::Start, &self.injector, self.catalog.modules())
                        .await
                }
                None => continue,
            };
            match outcome.and_then(|()| self.set_state(&name, PluginState::Started)) {
                Ok(()) => {
                    self.started.push(name.clone());
                    report.succeeded.push(name);
                }
                Err(error) => {
                    error!("{}", error);
                    if let Err(e) = self.set_state(&name, PluginState::Disabled) {
                        warn!("{}", e);
                    }
                    report.fail(&name, error);
                }
            }
        }

        info!("{}", report);
        report
    }

    /// Stop started plugins in reverse start order. A failing stop hook is
    /// recorded and the remaining plugins are still stopped.
    pub async fn stop(&mut self) -> PhaseReport {
        let mut report = PhaseReport::new(KernelLifecyclePhase::Stop);
        let started = std::mem::take(&mut self.started);

        for name in started.into_iter().rev() {
            let outcome = match self.plugins.get_mut(&name) {
                Some(plugin) if plugin.state() == PluginState::Started => {
                    plugin
                        .invoke(LifecycleHook::Stop, &self.injector, self.catalog.modules())
                        .await
                }
                _ => continue,
            };
            if let Err(e) = self.set_state(&name, PluginState::Stopped) {
                warn!("{}", e);
            }
            match outcome {
                Ok(()) => report.succeeded.push(name),
                Err(error) => {
                    error!("{}", error);
                    report.fail(&name, error);
                }
            }
        }

        info!("{}", report);
        report
    }

    /// Switch a plugin back on. It is linked again by the next `resolve()`.
    pub fn enable(&mut self, name: &str) -> Result<(), PluginSystemError> {
        if !self.contains(name) {
            return Err(PluginSystemError::NotFound(name.to_string()));
        }
        self.switched_off.remove(name);
        if self.plugins.get(name).is_some_and(|p| p.state() == PluginState::Disabled) {
            self.set_state(name, PluginState::Initialized)?;
        }
        info!("Plugin {} enabled", name);
        Ok(())
    }

    /// Switch a plugin off. Started plugins must be stopped first.
    pub fn disable(&mut self, name: &str) -> Result<(), PluginSystemError> {
        if !self.contains(name) {
            return Err(PluginSystemError::NotFound(name.to_string()));
        }
        self.set_state(name, PluginState::Disabled)?;
        self.switched_off.insert(name.to_string());
        self.prioritized.retain(|n| n != name);
        info!("Plugin {} disabled", name);
        Ok(())
    }

    /// The shared component injector
    pub fn injector(&self) -> &ComponentInjector {
        &self.injector
    }

    /// Read-only handle onto plugin summaries, also published as the
    /// `registry` component
    pub fn handle(&self) -> &RegistryHandle {
        &self.handle
    }

    pub fn catalog(&self) -> &PluginCatalog {
        &self.catalog
    }

    pub fn id(&self) -> LifecycleId {
        self.id
    }

    /// Manifest paths already processed by `register()`
    pub fn registered_paths(&self) -> &BTreeSet<PathBuf> {
        &self.registered_paths
    }

    /// Manifest paths found by the last `discover()` and not yet registered
    pub fn unregistered_paths(&self) -> &BTreeSet<PathBuf> {
        &self.unregistered
    }
}

/// Links between plugins must point both ways, and the priority order may
/// only hold plugins that can run.
impl Validate for PluginRegistry {
    fn validate(&self) -> Validation {
        let mut validation = Validation::new();
        for plugin in self.iter() {
            let name = plugin.name();
            for violation in plugin.manifest().validate().into_violations() {
                validation.push(format!("{}: {}", name, violation));
            }
            for dependency in plugin.dependencies() {
                let linked = self.get(dependency).is_some_and(|d| d.dependents().iter().any(|n| n == name));
                validation.require(linked, format!("{}: dependency {} does not list it as a dependent", name, dependency));
            }
            for dependent in plugin.dependents() {
                let linked = self.get(dependent).is_some_and(|d| d.dependencies().iter().any(|n| n == name));
                validation.require(linked, format!("{}: dependent {} does not list it as a dependency", name, dependent));
            }
        }
        for name in &self.prioritized {
            let orderable = self.get(name).is_some_and(|p| is_orderable(p.state()));
            validation.require(orderable, format!("{} is prioritized but cannot run", name));
        }
        validation
    }
}

/// Whether a plugin in `state` takes part in prioritization
fn is_orderable(state: PluginState) -> bool {
    !matches!(state, PluginState::Initialized | PluginState::Disabled)
}
