use std::fmt;

use serde::Serialize;

use crate::kernel::lifecycle::Lifecycle;
use crate::plugin_system::context::PluginContext;

/// Runtime state of a registered plugin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PluginState {
    /// Registered, dependencies not yet resolved
    #[default]
    Initialized,
    /// Dependencies resolved; eligible for initialize and start
    Enabled,
    /// Excluded from the pipeline (failed resolution, a failed dependency,
    /// or switched off by the host)
    Disabled,
    Started,
    Stopped,
}

impl PluginState {
    /// Whether the registry may move a plugin from `self` to `next`
    pub fn can_transition_to(self, next: PluginState) -> bool {
        use PluginState::*;
        matches!(
            (self, next),
            (Initialized, Enabled)
                | (Initialized, Disabled)
                | (Enabled, Enabled)
                | (Enabled, Disabled)
                | (Enabled, Started)
                | (Disabled, Initialized)
                | (Disabled, Enabled)
                | (Disabled, Disabled)
                | (Started, Stopped)
                | (Stopped, Started)
                | (Stopped, Disabled)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PluginState::Initialized => "INITIALIZED",
            PluginState::Enabled => "ENABLED",
            PluginState::Disabled => "DISABLED",
            PluginState::Started => "STARTED",
            PluginState::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core trait that all plugins implement.
///
/// Every hook receives the plugin's [`PluginContext`], through which it
/// registers and reads components. Hooks default to no-ops; most plugins
/// override `initialize` (register components) and `start`/`stop` (bind and
/// release external resources).
pub trait Plugin: Lifecycle<PluginContext> {
    /// Short human-readable description used in listings
    fn description(&self) -> &str {
        ""
    }
}
