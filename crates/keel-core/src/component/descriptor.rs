//! Component descriptors: what a plugin hands to the injector.
use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::component::error::ComponentError;
use crate::kernel::lifecycle::{Validate, Validation};

/// Type-erased, shareable component value
pub type ComponentValue = Arc<dyn Any + Send + Sync>;

/// Factory invoked with its resolved dependencies, in declared order
pub type FactoryFn =
    Arc<dyn Fn(&ResolvedDependencies) -> Result<ComponentValue, ComponentError> + Send + Sync>;

/// How a component produces its value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    /// A fixed value supplied at registration
    Value,
    /// A factory resolved lazily from other components
    Factory,
    /// A lazily loaded external capability with no component dependencies
    Module,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentKind::Value => write!(f, "value"),
            ComponentKind::Factory => write!(f, "factory"),
            ComponentKind::Module => write!(f, "module"),
        }
    }
}

/// Downcast a component value to `T`, reporting `name` on mismatch.
pub fn downcast_value<T: Any + Send + Sync>(name: &str, value: ComponentValue) -> Result<Arc<T>, ComponentError> {
    value.downcast::<T>().map_err(|_| ComponentError::TypeMismatch {
        name: name.to_string(),
        expected: type_name::<T>(),
    })
}

/// Registration request for one component
#[derive(Clone)]
pub struct ComponentDescriptor {
    pub name: String,
    pub kind: ComponentKind,
    pub value: Option<ComponentValue>,
    pub factory: Option<FactoryFn>,
    /// Names of the components passed to `factory`, in order
    pub dependencies: Vec<String>,
    /// Free-form grouping label used by `filter` (e.g. `router`)
    pub role: Option<String>,
    /// Name of the plugin that registered this component
    pub plugin: Option<String>,
    /// Replace an existing component of the same name instead of failing
    pub override_existing: bool,
}

impl ComponentDescriptor {
    fn bare(name: &str, kind: ComponentKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            value: None,
            factory: None,
            dependencies: Vec::new(),
            role: None,
            plugin: None,
            override_existing: false,
        }
    }

    /// A fixed value
    pub fn value<T: Any + Send + Sync>(name: &str, value: T) -> Self {
        Self::shared(name, Arc::new(value))
    }

    /// A fixed value that is already shared
    pub fn shared(name: &str, value: ComponentValue) -> Self {
        let mut descriptor = Self::bare(name, ComponentKind::Value);
        descriptor.value = Some(value);
        descriptor
    }

    /// A factory over the named dependencies
    pub fn factory<T, I, S, F>(name: &str, dependencies: I, factory: F) -> Self
    where
        T: Any + Send + Sync,
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&ResolvedDependencies) -> Result<T, ComponentError> + Send + Sync + 'static,
    {
        let mut descriptor = Self::bare(name, ComponentKind::Factory);
        descriptor.dependencies = dependencies.into_iter().map(Into::into).collect();
        descriptor.factory = Some(Arc::new(move |deps: &ResolvedDependencies| {
            factory(deps).map(|value| Arc::new(value) as ComponentValue)
        }));
        descriptor
    }

    /// A module whose value is produced by `loader` on first use
    pub fn module<T, F>(name: &str, loader: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> Result<T, ComponentError> + Send + Sync + 'static,
    {
        let mut descriptor = Self::bare(name, ComponentKind::Module);
        descriptor.factory = Some(Arc::new(move |_: &ResolvedDependencies| {
            loader().map(|value| Arc::new(value) as ComponentValue)
        }));
        descriptor
    }

    /// A module backed by an already type-erased loader
    pub fn module_from(name: &str, loader: FactoryFn) -> Self {
        let mut descriptor = Self::bare(name, ComponentKind::Module);
        descriptor.factory = Some(loader);
        descriptor
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.role = Some(role.to_string());
        self
    }

    pub fn owned_by(mut self, plugin: &str) -> Self {
        self.plugin = Some(plugin.to_string());
        self
    }

    pub fn overriding(mut self) -> Self {
        self.override_existing = true;
        self
    }
}

impl Validate for ComponentDescriptor {
    fn validate(&self) -> Validation {
        let mut validation = Validation::new();
        validation.require(!self.name.trim().is_empty(), "component name must not be empty");
        match self.kind {
            ComponentKind::Value => {
                validation.require(self.value.is_some(), "value component requires a value");
                validation.require(self.factory.is_none(), "value component must not carry a factory");
                validation.require(self.dependencies.is_empty(), "value component must not declare dependencies");
            }
            ComponentKind::Factory => {
                validation.require(self.factory.is_some(), "factory component requires a factory function");
            }
            ComponentKind::Module => {
                validation.require(self.factory.is_some(), "module component requires a loader");
                validation.require(self.dependencies.is_empty(), "module component must not declare dependencies");
            }
        }
        for dependency in &self.dependencies {
            validation.require(!dependency.trim().is_empty(), "dependency names must not be empty");
        }
        validation
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("has_value", &self.value.is_some())
            .field("has_factory", &self.factory.is_some())
            .field("dependencies", &self.dependencies)
            .field("role", &self.role)
            .field("plugin", &self.plugin)
            .field("override_existing", &self.override_existing)
            .finish()
    }
}

/// Resolved dependency values handed to a factory.
pub struct ResolvedDependencies {
    component: String,
    names: Vec<String>,
    values: Vec<ComponentValue>,
}

impl ResolvedDependencies {
    pub(crate) fn new(component: &str, names: Vec<String>, values: Vec<ComponentValue>) -> Self {
        Self {
            component: component.to_string(),
            names,
            values,
        }
    }

    /// Name of the component being built
    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Typed value at positional `index`
    pub fn get<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>, ComponentError> {
        let value = self.values.get(index).cloned().ok_or_else(|| ComponentError::MissingArgument {
            name: self.component.clone(),
            index,
        })?;
        downcast_value(&self.names[index], value)
    }

    /// Typed value of the dependency called `name`
    pub fn by_name<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, ComponentError> {
        let index = self
            .names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| ComponentError::UnknownComponent(name.to_string()))?;
        self.get(index)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}
