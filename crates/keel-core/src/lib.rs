//! # keel-core
//!
//! Plugin runtime core: discovers manifest-described plugins, links them by
//! version-ranged dependencies, orders their initialization, and shares a
//! lazily resolved component namespace between them.
pub mod component;
pub mod config;
pub mod kernel;
pub mod plugin_system;

pub use component::{ComponentDescriptor, ComponentError, ComponentInjector, Registrar, RegistrarHandle};
pub use config::{AppConfig, ConfigFormat, FailurePolicy, StartOrder};
pub use kernel::bootstrap::{AppState, Application, StartupReport};
pub use kernel::error::{Error as KernelError, Result};
pub use kernel::lifecycle::{Lifecycle, LifecycleHook, LifecycleId, Validate};
pub use plugin_system::{Plugin, PluginCatalog, PluginContext, PluginManifest, PluginRegistry, PluginState};

// Re-exported so plugin crates implement `Lifecycle` with the same macro
pub use async_trait::async_trait;
