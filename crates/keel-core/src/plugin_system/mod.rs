//! # Keel Plugin System
//!
//! Everything that turns manifests on disk into running plugins.
//!
//! - **[`loader`]**: finds manifest files and parses them.
//! - **[`manifest`]**: the manifest model ([`PluginManifest`]) and its validation.
//! - **[`catalog`]**: the static table mapping a manifest's `main` to plugin
//!   code, plus the host module table.
//! - **[`plugin`]**: [`RegisteredPlugin`], a plugin with its manifest, state
//!   and dependency links, and its `resolve` check.
//! - **[`registry`]**: [`PluginRegistry`], which drives the phase pipeline and
//!   owns the shared component injector.
//! - **[`context`]**: [`PluginContext`], handed to every plugin hook.
//! - **[`traits`]**: the [`Plugin`] trait and [`PluginState`].
//! - **[`dependency`]**, **[`version`]**: dependency declarations and
//!   semantic-version ranges.
//! - **[`handle`]**: the read-only [`RegistryHandle`] published as the
//!   `registry` component.
//! - **[`report`]**: per-phase outcomes.
pub mod catalog;
pub mod context;
pub mod dependency;
pub mod error;
pub mod handle;
pub mod loader;
pub mod manifest;
pub mod plugin;
pub mod registry;
pub mod report;
pub mod traits;
pub mod version;

pub use catalog::{ModuleTable, PluginCatalog};
pub use context::PluginContext;
pub use dependency::{DependencyError, PluginDependency};
pub use error::PluginSystemError;
pub use handle::{PluginSummary, RegistryHandle};
pub use loader::ManifestLoader;
pub use manifest::{LoadPolicy, PluginKind, PluginManifest};
pub use plugin::RegisteredPlugin;
pub use registry::PluginRegistry;
pub use report::{PhaseReport, PluginFailure, RegistrationReport, ResolutionReport};
pub use traits::{Plugin, PluginState};
pub use version::VersionRange;
