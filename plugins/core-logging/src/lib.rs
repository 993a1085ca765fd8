//! Keel core logging plugin.
//!
//! [`install_subscriber`] sets up the process-wide `tracing` subscriber and
//! routes `log` records (which the core emits) into it. Hosts call it before
//! building their application; the plugin's `install` hook calls it as well
//! for hosts that did not. On `initialize` the plugin publishes a `log`
//! component that other plugins use to write records tagged with their own
//! name.
//!
//! The filter comes from `KEEL_LOG`, then `RUST_LOG`, then `info`. Setting
//! `KEEL_LOG_FORMAT=json` switches to JSON lines. Records go to stderr.
use std::env;
use std::sync::OnceLock;

use keel_core::kernel::error::{Error as KernelError, Result as KernelResult};
use keel_core::{async_trait, Lifecycle, Plugin, PluginCatalog, PluginContext, PluginManifest};
use log::{debug, info};
use tracing_subscriber::EnvFilter;

/// Entry point naming this plugin in a manifest's `main`
pub const ENTRY_POINT: &str = "core-logging";

/// Name of the component published by this plugin
pub const LOG_COMPONENT: &str = "log";

const FILTER_ENV: &str = "KEEL_LOG";
const FORMAT_ENV: &str = "KEEL_LOG_FORMAT";
const DEFAULT_FILTER: &str = "info";

static INSTALLED: OnceLock<()> = OnceLock::new();

/// Filter directives from `KEEL_LOG`, `RUST_LOG` or the default
pub fn filter_directives() -> String {
    env::var(FILTER_ENV)
        .or_else(|_| env::var(EnvFilter::DEFAULT_ENV))
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Install the global subscriber and the `log` bridge.
///
/// Only the first call in a process installs anything. Later calls (a second
/// application in the same process, tests) return `Ok(false)`.
pub fn install_subscriber() -> KernelResult<bool> {
    if INSTALLED.get().is_some() {
        return Ok(false);
    }

    let filter = EnvFilter::try_new(filter_directives())
        .map_err(|e| KernelError::Other(format!("Invalid log filter: {}", e)))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let installed = if env::var(FORMAT_ENV).is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    let _ = INSTALLED.set(());
    if installed.is_err() {
        // Someone else owns the global subscriber
        return Ok(false);
    }
    tracing_log::LogTracer::init().map_err(|e| KernelError::Other(format!("Failed to bridge log records: {}", e)))?;
    Ok(true)
}

/// Logger handed to other plugins through the `log` component
#[derive(Debug, Clone, Copy, Default)]
pub struct PluginLogger;

impl PluginLogger {
    pub fn info(&self, plugin: &str, message: &str) {
        tracing::info!(plugin, "{}", message);
    }

    pub fn warn(&self, plugin: &str, message: &str) {
        tracing::warn!(plugin, "{}", message);
    }

    pub fn error(&self, plugin: &str, message: &str) {
        tracing::error!(plugin, "{}", message);
    }

    pub fn debug(&self, plugin: &str, message: &str) {
        tracing::debug!(plugin, "{}", message);
    }
}

#[derive(Default)]
pub struct LoggingPlugin;

#[async_trait]
impl Lifecycle<PluginContext> for LoggingPlugin {
    async fn install(&self, ctx: &mut PluginContext) -> KernelResult<()> {
        if install_subscriber()? {
            info!("Logging installed by {} (filter: {})", ctx.plugin_name(), filter_directives());
        } else {
            debug!("Global subscriber already present, {} leaves it in place", ctx.plugin_name());
        }
        Ok(())
    }

    async fn initialize(&self, ctx: &mut PluginContext) -> KernelResult<()> {
        ctx.value(LOG_COMPONENT, PluginLogger)?;
        Ok(())
    }

    async fn stop(&self, ctx: &mut PluginContext) -> KernelResult<()> {
        info!("{} stopping", ctx.plugin_name());
        Ok(())
    }
}

impl Plugin for LoggingPlugin {
    fn description(&self) -> &str {
        "Installs the tracing subscriber and exposes the `log` component"
    }
}

/// Catalog holding this plugin's entry point
pub fn catalog() -> PluginCatalog {
    PluginCatalog::new().with_entry(ENTRY_POINT, |_: &PluginManifest| Box::new(LoggingPlugin) as Box<dyn Plugin>)
}
