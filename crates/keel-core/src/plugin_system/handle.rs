//! Read-only view of the registry, published as the `registry` component.
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

use crate::kernel::lifecycle::LifecycleId;
use crate::plugin_system::manifest::PluginKind;
use crate::plugin_system::traits::PluginState;

/// Snapshot of one plugin's runtime state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginSummary {
    pub id: LifecycleId,
    pub name: String,
    pub version: String,
    pub kind: PluginKind,
    pub state: PluginState,
    pub dependencies: Vec<String>,
    pub dependents: Vec<String>,
    pub components: Vec<String>,
}

/// Shared, cheaply cloned handle onto the registry's plugin summaries.
///
/// The registry republishes a plugin's summary whenever its state, links or
/// components change, so collaborators holding the handle always see the
/// current picture without borrowing the registry itself.
#[derive(Debug, Clone, Default)]
pub struct RegistryHandle {
    summaries: Arc<RwLock<Vec<PluginSummary>>>,
}

impl RegistryHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plugin names in registration order
    pub fn names(&self) -> Vec<String> {
        self.read(|summaries| summaries.iter().map(|s| s.name.clone()).collect())
    }

    pub fn get(&self, name: &str) -> Option<PluginSummary> {
        self.read(|summaries| summaries.iter().find(|s| s.name == name).cloned())
    }

    /// All summaries in registration order
    pub fn summaries(&self) -> Vec<PluginSummary> {
        self.read(|summaries| summaries.clone())
    }

    pub fn len(&self) -> usize {
        self.read(|summaries| summaries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read<T>(&self, f: impl FnOnce(&Vec<PluginSummary>) -> T) -> T {
        let guard = self.summaries.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Insert or replace the summary for `summary.name`, keeping position
    pub(crate) fn publish(&self, summary: PluginSummary) {
        let mut guard = self.summaries.write().unwrap_or_else(PoisonError::into_inner);
        match guard.iter_mut().find(|s| s.name == summary.name) {
            Some(existing) => *existing = summary,
            None => guard.push(summary),
        }
    }
}
