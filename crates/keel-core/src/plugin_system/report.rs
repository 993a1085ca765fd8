//! Per-phase outcomes returned by the registry.
//!
//! Phases never stop at the first failing plugin. They record what happened
//! to every plugin and hand the record back so the caller can decide to
//! abort or carry on in degraded mode.
use std::fmt;
use std::path::PathBuf;

use crate::kernel::error::KernelLifecyclePhase;
use crate::plugin_system::dependency::DependencyError;
use crate::plugin_system::error::PluginSystemError;

/// A manifest that could not be turned into a plugin
#[derive(Debug)]
pub struct ManifestFailure {
    pub path: PathBuf,
    pub error: PluginSystemError,
}

/// Outcome of `register()`
#[derive(Debug, Default)]
pub struct RegistrationReport {
    /// Names of the plugins added, in processing order
    pub registered: Vec<String>,
    /// Manifests without the host metadata block
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<ManifestFailure>,
}

impl RegistrationReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outcome of `resolve()`
#[derive(Debug, Default)]
pub struct ResolutionReport {
    /// Plugins whose dependencies were all satisfied, in registration order
    pub resolved: Vec<String>,
    /// Plugins with unmet dependencies and every problem found for each
    pub failed: Vec<(String, Vec<DependencyError>)>,
}

impl ResolutionReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Errors reported for `plugin`, if it failed
    pub fn errors_for(&self, plugin: &str) -> Option<&[DependencyError]> {
        self.failed
            .iter()
            .find(|(name, _)| name == plugin)
            .map(|(_, errors)| errors.as_slice())
    }
}

/// A plugin whose hook failed or was refused
#[derive(Debug)]
pub struct PluginFailure {
    pub plugin: String,
    pub error: PluginSystemError,
}

/// Outcome of `initialize()`, `start()` or `stop()`
#[derive(Debug)]
pub struct PhaseReport {
    pub phase: KernelLifecyclePhase,
    /// Plugins whose hook ran successfully, in invocation order
    pub succeeded: Vec<String>,
    /// Plugins left out of the phase (disabled, not ready)
    pub skipped: Vec<String>,
    pub failed: Vec<PluginFailure>,
}

impl PhaseReport {
    pub fn new(phase: KernelLifecyclePhase) -> Self {
        Self {
            phase,
            succeeded: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub(crate) fn fail(&mut self, plugin: &str, error: PluginSystemError) {
        self.failed.push(PluginFailure {
            plugin: plugin.to_string(),
            error,
        });
    }
}

impl fmt::Display for PhaseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} succeeded, {} skipped, {} failed",
            self.phase,
            self.succeeded.len(),
            self.skipped.len(),
            self.failed.len()
        )
    }
}
