use std::fmt;

use crate::component::injector::ComponentInjector;
use crate::config::{AppConfig, FailurePolicy};
use crate::kernel::error::{Error, KernelLifecyclePhase, Result};
use crate::kernel::lifecycle::{LifecycleId, Validate, Validation};
use crate::plugin_system::catalog::PluginCatalog;
use crate::plugin_system::dependency::DependencyError;
use crate::plugin_system::loader::ManifestLoader;
use crate::plugin_system::registry::PluginRegistry;
use crate::plugin_system::report::{PhaseReport, RegistrationReport, ResolutionReport};

/// Application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Initialized,
    Starting,
    Started,
    Stopping,
    Stopped,
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AppState::Initialized => "INITIALIZED",
            AppState::Starting => "STARTING",
            AppState::Started => "STARTED",
            AppState::Stopping => "STOPPING",
            AppState::Stopped => "STOPPED",
        };
        f.write_str(s)
    }
}

/// Outcome of discovery through prioritization
#[derive(Debug)]
pub struct LoadReport {
    pub registration: RegistrationReport,
    pub resolution: ResolutionReport,
    /// Final priority order
    pub priority: Vec<String>,
    /// Plugins taken out because they were part of a dependency cycle
    pub cyclic: Vec<String>,
}

/// Everything that happened while starting
#[derive(Debug)]
pub struct StartupReport {
    pub load: LoadReport,
    pub initialize: PhaseReport,
    pub start: PhaseReport,
}

impl StartupReport {
    /// True when no phase reported a failure
    pub fn is_clean(&self) -> bool {
        self.load.registration.is_success()
            && self.load.resolution.is_success()
            && self.load.cyclic.is_empty()
            && self.initialize.is_success()
            && self.start.is_success()
    }
}

/// Drives one plugin registry through its phases.
///
/// Each application owns an independent registry and injector.
pub struct Application {
    id: LifecycleId,
    config: AppConfig,
    registry: PluginRegistry,
    state: AppState,
}

impl Application {
    pub fn new(config: AppConfig, catalog: PluginCatalog) -> Self {
        log::info!("Initializing {} v{}", config.name, config.version);
        let mut registry = PluginRegistry::new(catalog, ManifestLoader::from_config(&config));
        registry.set_start_order(config.start_order);
        Self {
            id: LifecycleId::new(),
            config,
            registry,
            state: AppState::Initialized,
        }
    }

    pub fn id(&self) -> LifecycleId {
        self.id
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PluginRegistry {
        &mut self.registry
    }

    pub fn injector(&self) -> &ComponentInjector {
        self.registry.injector()
    }

    fn aborts(&self, failed: usize) -> bool {
        failed > 0 && self.config.failure_policy == FailurePolicy::Abort
    }

    /// Discover, register, resolve and prioritize.
    ///
    /// With [`FailurePolicy::Skip`], plugins caught in a dependency cycle are
    /// disabled (together with their dependents) and prioritization is
    /// retried.
    pub async fn prepare(&mut self) -> Result<LoadReport> {
        let config = self.config.validate();
        if !config.is_valid() {
            return Err(Error::lifecycle(
                KernelLifecyclePhase::Discover,
                format!("invalid configuration: {}", config),
                None,
            ));
        }

        log::info!("Discovering plugins...");
        self.registry.discover().await;

        let registration = self.registry.register().await;
        if self.aborts(registration.failed.len()) {
            let message = format!("{} manifest(s) failed to register", registration.failed.len());
            let source = registration.failed.into_iter().next().map(|f| Error::from(f.error));
            return Err(Error::lifecycle(KernelLifecyclePhase::Register, message, source));
        }

        let resolution = self.registry.resolve().await;
        if self.aborts(resolution.failed.len()) {
            let names: Vec<&str> = resolution.failed.iter().map(|(name, _)| name.as_str()).collect();
            let message = format!("unresolved plugins: {}", names.join(", "));
            let source = resolution
                .failed
                .first()
                .and_then(|(_, errors)| errors.first().cloned())
                .map(Error::from);
            return Err(Error::lifecycle(KernelLifecyclePhase::Resolve, message, source));
        }

        let mut cyclic = Vec::new();
        let priority = loop {
            match self.registry.prioritize() {
                Ok(priority) => break priority,
                Err(DependencyError::CyclicDependency(cycle)) if self.config.failure_policy == FailurePolicy::Skip => {
                    log::warn!("Disabling plugins in dependency cycle: {}", cycle.join(" -> "));
                    let before = cyclic.len();
                    for name in &cycle {
                        if cyclic.contains(name) {
                            continue;
                        }
                        self.registry.disable(name)?;
                        cyclic.push(name.clone());
                    }
                    if cyclic.len() == before {
                        return Err(Error::lifecycle(
                            KernelLifecyclePhase::Prioritize,
                            "cannot order plugins",
                            Some(DependencyError::CyclicDependency(cycle).into()),
                        ));
                    }
                }
                Err(e) => {
                    return Err(Error::lifecycle(
                        KernelLifecyclePhase::Prioritize,
                        "cannot order plugins",
                        Some(e.into()),
                    ));
                }
            }
        };

        let registry = self.registry.validate();
        if !registry.is_valid() {
            log::warn!("Registry is inconsistent after prioritize: {}", registry);
        }

        Ok(LoadReport {
            registration,
            resolution,
            priority,
            cyclic,
        })
    }

    /// Run every prioritized plugin's initialize hook
    pub async fn initialize(&mut self) -> Result<PhaseReport> {
        log::info!("Initializing plugins...");
        let report = self.registry.initialize().await;
        if self.aborts(report.failed.len()) {
            return Err(phase_failure(report));
        }
        Ok(report)
    }

    /// Run the full startup pipeline and start every plugin.
    pub async fn start(&mut self) -> Result<StartupReport> {
        if !matches!(self.state, AppState::Initialized) {
            return Err(Error::lifecycle(
                KernelLifecyclePhase::Start,
                format!("application is {}", self.state),
                None,
            ));
        }
        self.state = AppState::Starting;

        let outcome = self.run_startup().await;
        match &outcome {
            Ok(_) => self.state = AppState::Started,
            Err(e) => {
                log::error!("Startup aborted: {}", e);
                self.state = AppState::Stopped;
            }
        }
        outcome
    }

    async fn run_startup(&mut self) -> Result<StartupReport> {
        let load = self.prepare().await?;
        let initialize = self.initialize().await?;

        log::info!("Starting plugins...");
        let start = self.registry.start().await;
        if self.aborts(start.failed.len()) {
            self.registry.stop().await;
            return Err(phase_failure(start));
        }

        log::info!("{} started with {} plugin(s)", self.config.name, start.succeeded.len());
        Ok(StartupReport { load, initialize, start })
    }

    /// Stop every started plugin in reverse start order.
    ///
    /// All plugins are stopped even when some fail; the failures are
    /// reported afterwards.
    pub async fn stop(&mut self) -> Result<PhaseReport> {
        if self.state != AppState::Started {
            return Err(Error::lifecycle(
                KernelLifecyclePhase::Stop,
                format!("application is {}", self.state),
                None,
            ));
        }
        self.state = AppState::Stopping;
        log::info!("Stopping plugins...");
        let report = self.registry.stop().await;
        self.state = AppState::Stopped;

        if !report.is_success() {
            let error = phase_failure(report);
            log::error!("{}", error);
            return Err(error);
        }
        Ok(report)
    }
}

/// Fold a failed phase report into a lifecycle error naming every failed
/// plugin, with the first failure as the source.
fn phase_failure(report: PhaseReport) -> Error {
    let names: Vec<&str> = report.failed.iter().map(|f| f.plugin.as_str()).collect();
    let message = format!("failed plugins: {}", names.join(", "));
    let source = report.failed.into_iter().next().map(|f| Error::from(f.error));
    Error::lifecycle(report.phase, message, source)
}

/// The configuration and the registry both have to hold up
impl Validate for Application {
    fn validate(&self) -> Validation {
        let mut validation = Validation::new();
        for violation in self.config.validate().into_violations() {
            validation.push(format!("config: {}", violation));
        }
        for violation in self.registry.validate().into_violations() {
            validation.push(violation);
        }
        validation
    }
}
