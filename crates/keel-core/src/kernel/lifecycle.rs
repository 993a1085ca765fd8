//! Schema-validated lifecycle base shared by plugins, the registry and the
//! application.
//!
//! Three pieces make up the base:
//! - [`LifecycleId`], a process-unique identifier assigned at construction;
//! - [`Validate`], which checks an entity against its declared schema and
//!   reports every violation at once;
//! - [`Lifecycle`], the named hooks (`install`, `initialize`, `start`,
//!   `update`, `upgrade`, `stop`, `remove`) with no-op defaults. The hook
//!   context type is a parameter so each entity receives the context it needs.
//!
//! The trait itself does not sequence hooks. Callers (the registry) enforce
//! ordering through [`PluginState`](crate::plugin_system::PluginState).
use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::kernel::error::Result;

/// Process-unique identifier carried by every lifecycle entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LifecycleId(Uuid);

impl LifecycleId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for LifecycleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LifecycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of validating an entity against its schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    violations: Vec<String>,
}

impl Validation {
    /// An empty (valid) validation result
    pub fn new() -> Self {
        Self { violations: Vec::new() }
    }

    /// Record `violation` unless `condition` holds
    pub fn require(&mut self, condition: bool, violation: impl Into<String>) -> &mut Self {
        if !condition {
            self.violations.push(violation.into());
        }
        self
    }

    /// Record a violation unconditionally
    pub fn push(&mut self, violation: impl Into<String>) -> &mut Self {
        self.violations.push(violation.into());
        self
    }

    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    pub fn into_violations(self) -> Vec<String> {
        self.violations
    }
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "valid")
        } else {
            write!(f, "{}", self.violations.join("; "))
        }
    }
}

/// Entities with a declared structural contract
pub trait Validate {
    /// Check `self` against its schema, collecting every violation
    fn validate(&self) -> Validation;
}

/// Named lifecycle hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleHook {
    Install,
    Initialize,
    Start,
    Update,
    Upgrade,
    Stop,
    Remove,
}

impl LifecycleHook {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleHook::Install => "install",
            LifecycleHook::Initialize => "initialize",
            LifecycleHook::Start => "start",
            LifecycleHook::Update => "update",
            LifecycleHook::Upgrade => "upgrade",
            LifecycleHook::Stop => "stop",
            LifecycleHook::Remove => "remove",
        }
    }

    /// Dispatch this hook on `target`
    pub async fn invoke<C, L>(self, target: &L, ctx: &mut C) -> Result<()>
    where
        C: Send + ?Sized,
        L: Lifecycle<C> + ?Sized,
    {
        match self {
            LifecycleHook::Install => target.install(ctx).await,
            LifecycleHook::Initialize => target.initialize(ctx).await,
            LifecycleHook::Start => target.start(ctx).await,
            LifecycleHook::Update => target.update(ctx).await,
            LifecycleHook::Upgrade => target.upgrade(ctx).await,
            LifecycleHook::Stop => target.stop(ctx).await,
            LifecycleHook::Remove => target.remove(ctx).await,
        }
    }
}

impl fmt::Display for LifecycleHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle hooks over a context `C`. Every hook defaults to a no-op, so
/// implementors override only what they need.
#[async_trait]
pub trait Lifecycle<C: Send + ?Sized>: Send + Sync {
    async fn install(&self, _ctx: &mut C) -> Result<()> {
        Ok(())
    }

    async fn initialize(&self, _ctx: &mut C) -> Result<()> {
        Ok(())
    }

    async fn start(&self, _ctx: &mut C) -> Result<()> {
        Ok(())
    }

    async fn update(&self, _ctx: &mut C) -> Result<()> {
        Ok(())
    }

    async fn upgrade(&self, _ctx: &mut C) -> Result<()> {
        Ok(())
    }

    async fn stop(&self, _ctx: &mut C) -> Result<()> {
        Ok(())
    }

    async fn remove(&self, _ctx: &mut C) -> Result<()> {
        Ok(())
    }
}
