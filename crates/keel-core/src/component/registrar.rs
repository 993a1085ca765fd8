//! Extension points published by plugins.
//!
//! A plugin that wants other plugins to contribute components of a given
//! kind (routes, commands, ...) publishes a [`RegistrarHandle`] as a value
//! component. Contributors look it up with
//! [`PluginContext::registrar`](crate::plugin_system::PluginContext::registrar)
//! and register through it, which stamps the registrar's role on every
//! descriptor so the publisher can later gather them with `filter`.
use std::sync::Arc;

use crate::component::descriptor::ComponentDescriptor;
use crate::component::error::ComponentError;
use crate::component::injector::{ComponentInfo, ComponentInjector};

/// Capability for registering components of one role
pub trait Registrar: Send + Sync {
    /// Role label stamped on contributed components
    fn role(&self) -> &str;

    /// Register `descriptor` under this registrar's role
    fn register(&self, injector: &ComponentInjector, descriptor: ComponentDescriptor) -> Result<(), ComponentError> {
        injector.register(descriptor.with_role(self.role()))
    }

    /// Everything contributed so far
    fn contributions(&self, injector: &ComponentInjector) -> Vec<ComponentInfo> {
        let role = self.role();
        injector.filter(|info| info.role.as_deref() == Some(role))
    }
}

/// Registrar that only tags components with a role
#[derive(Debug, Clone)]
pub struct RoleRegistrar {
    role: String,
}

impl RoleRegistrar {
    pub fn new(role: &str) -> Self {
        Self { role: role.to_string() }
    }
}

impl Registrar for RoleRegistrar {
    fn role(&self) -> &str {
        &self.role
    }
}

/// The value stored in the injector for a published registrar
#[derive(Clone)]
pub struct RegistrarHandle(Arc<dyn Registrar>);

impl RegistrarHandle {
    pub fn new<R: Registrar + 'static>(registrar: R) -> Self {
        Self(Arc::new(registrar))
    }

    pub fn role(&self) -> &str {
        self.0.role()
    }

    pub fn register(&self, injector: &ComponentInjector, descriptor: ComponentDescriptor) -> Result<(), ComponentError> {
        self.0.register(injector, descriptor)
    }

    pub fn contributions(&self, injector: &ComponentInjector) -> Vec<ComponentInfo> {
        self.0.contributions(injector)
    }
}
