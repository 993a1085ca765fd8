//! Two example plugins showing how plugins cooperate through components.
//!
//! - `router` publishes a `routes` registrar. Other plugins contribute
//!   [`Route`] values through it; on `start` the router collects them into a
//!   [`RouteTable`] component.
//! - `greeter` depends on `router`. It imports the host `clock` module,
//!   registers its message documents from `messages/`, builds a [`Greeter`]
//!   with a factory and contributes a `/greet` route.
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use keel_core::component::descriptor::ComponentDescriptor;
use keel_core::component::injector::InjectorHandle;
use keel_core::component::registrar::RoleRegistrar;
use keel_core::kernel::error::Result as KernelResult;
use keel_core::kernel::constants::INJECTOR_COMPONENT;
use keel_core::{ComponentError, Lifecycle, Plugin, PluginCatalog, PluginContext, PluginManifest};
use log::{info, warn};

pub const ROUTER_ENTRY: &str = "router";
pub const GREETER_ENTRY: &str = "greeter";

/// Host module the greeter imports
pub const CLOCK_MODULE: &str = "clock";
/// Registrar component published by the router
pub const ROUTES_REGISTRAR: &str = "routes";
pub const ROUTE_ROLE: &str = "router";
pub const ROUTE_TABLE: &str = "route-table";
pub const GREETER_COMPONENT: &str = "greeter";
pub const SALUTATION_COMPONENT: &str = "greeting.salutation";
pub const MESSAGES_DIR: &str = "messages";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub path: String,
    /// Component serving the route
    pub handler: String,
}

/// Routes gathered by the router when it starts, in contribution order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable(pub Vec<Route>);

impl RouteTable {
    pub fn handler_for(&self, path: &str) -> Option<&str> {
        self.0.iter().find(|r| r.path == path).map(|r| r.handler.as_str())
    }
}

pub struct RouterPlugin;

#[async_trait]
impl Lifecycle<PluginContext> for RouterPlugin {
    async fn initialize(&self, ctx: &mut PluginContext) -> KernelResult<()> {
        ctx.provide_registrar(ROUTES_REGISTRAR, RoleRegistrar::new(ROUTE_ROLE))?;
        Ok(())
    }

    async fn start(&self, ctx: &mut PluginContext) -> KernelResult<()> {
        let registrar = ctx.registrar(ROUTES_REGISTRAR)?;
        let contributed = registrar.contributions(ctx.injector());

        let mut table = RouteTable::default();
        for info in &contributed {
            match ctx.component_as::<Route>(&info.name) {
                Ok(route) => table.0.push((*route).clone()),
                Err(e) => warn!("Ignoring contribution {}: {}", info.name, e),
            }
        }
        for route in &table.0 {
            info!("Mounted {} -> {}", route.path, route.handler);
        }
        ctx.value(ROUTE_TABLE, table)?;
        Ok(())
    }
}

impl Plugin for RouterPlugin {
    fn description(&self) -> &str {
        "Collects routes contributed by other plugins"
    }
}

/// Builds greetings in the default salutation or in a language whose
/// message document was loaded from `messages/`.
#[derive(Clone)]
pub struct Greeter {
    salutation: String,
    since: SystemTime,
    injector: InjectorHandle,
}

impl Greeter {
    pub fn greet(&self, name: &str) -> String {
        format!("{}, {}!", self.salutation, name)
    }

    /// Greeting from the `greeting.<lang>` document, falling back to the
    /// default salutation
    pub fn greet_in(&self, lang: &str, name: &str) -> String {
        let document = self
            .injector
            .upgrade()
            .and_then(|injector| injector.get_as::<serde_json::Value>(&format!("greeting.{}", lang)).ok());
        match document.as_ref().and_then(|d| d["salutation"].as_str()) {
            Some(salutation) => format!("{}, {}!", salutation, name),
            None => self.greet(name),
        }
    }

    /// When the host clock was first read
    pub fn since(&self) -> SystemTime {
        self.since
    }
}

pub struct GreeterPlugin {
    salutation: String,
}

impl GreeterPlugin {
    pub fn new(manifest: &PluginManifest) -> Self {
        // Hosts may pass settings through the manifest's credentials block
        let salutation = manifest
            .credentials
            .as_ref()
            .and_then(|c| c["salutation"].as_str())
            .unwrap_or("Hello")
            .to_string();
        Self { salutation }
    }
}

#[async_trait]
impl Lifecycle<PluginContext> for GreeterPlugin {
    async fn initialize(&self, ctx: &mut PluginContext) -> KernelResult<()> {
        ctx.value(SALUTATION_COMPONENT, self.salutation.clone())?;
        ctx.require(&[(CLOCK_MODULE, CLOCK_MODULE)])?;
        if ctx.base_dir().is_some_and(|dir| dir.join(MESSAGES_DIR).is_dir()) {
            let loaded = ctx.directory(MESSAGES_DIR).await?;
            info!("Loaded message documents: {}", loaded.join(", "));
        }

        ctx.factory(
            GREETER_COMPONENT,
            [SALUTATION_COMPONENT, CLOCK_MODULE, INJECTOR_COMPONENT],
            |deps| {
                Ok(Greeter {
                    salutation: (*deps.get::<String>(0)?).clone(),
                    since: *deps.get::<SystemTime>(1)?,
                    injector: (*deps.get::<InjectorHandle>(2)?).clone(),
                })
            },
        )?;

        ctx.register_with(
            ROUTES_REGISTRAR,
            ComponentDescriptor::value(
                "route.greet",
                Route {
                    path: "/greet".to_string(),
                    handler: GREETER_COMPONENT.to_string(),
                },
            ),
        )?;
        Ok(())
    }

    async fn start(&self, ctx: &mut PluginContext) -> KernelResult<()> {
        let greeter: Arc<Greeter> = ctx.component_as(GREETER_COMPONENT)?;
        info!("{}", greeter.greet(ctx.plugin_name()));
        Ok(())
    }
}

impl Plugin for GreeterPlugin {
    fn description(&self) -> &str {
        "Greets through a factory-built component and contributes a route"
    }
}

/// Catalog with both example entry points
pub fn catalog() -> PluginCatalog {
    PluginCatalog::new()
        .with_entry(ROUTER_ENTRY, |_: &PluginManifest| Box::new(RouterPlugin) as Box<dyn Plugin>)
        .with_entry(GREETER_ENTRY, |m: &PluginManifest| Box::new(GreeterPlugin::new(m)) as Box<dyn Plugin>)
}

/// The clock module expected by the greeter: the time it was first read
pub fn clock_module() -> Result<SystemTime, ComponentError> {
    Ok(SystemTime::now())
}

#[cfg(test)]
mod tests;
