//! The component injector: one lazily-resolved namespace per registry.
//!
//! Components are stored by name. Value components are ready immediately;
//! factory and module components run their factory on the first `get` and
//! the result is memoized for the rest of the injector's life. Each
//! component carries a resolution slot guarded by its own lock, so
//! concurrent `get` calls for the same name run the factory once and the
//! other callers wait for the memoized value.
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::thread::{self, ThreadId};

use log::{debug, warn};

use crate::component::descriptor::{
    downcast_value, ComponentDescriptor, ComponentKind, ComponentValue, FactoryFn, ResolvedDependencies,
};
use crate::component::error::ComponentError;
use crate::kernel::constants::{INJECTOR_COMPONENT, REGISTRY_COMPONENT};
use crate::kernel::lifecycle::Validate;
use crate::plugin_system::handle::RegistryHandle;

enum Slot {
    Pending,
    Resolving(ThreadId),
    Ready(ComponentValue),
}

struct Component {
    name: String,
    kind: ComponentKind,
    dependencies: Vec<String>,
    role: Option<String>,
    plugin: Option<String>,
    factory: Option<FactoryFn>,
    slot: Mutex<Slot>,
    settled: Condvar,
}

impl Component {
    fn from_descriptor(descriptor: ComponentDescriptor) -> Self {
        let slot = match descriptor.value {
            Some(value) => Slot::Ready(value),
            None => Slot::Pending,
        };
        Self {
            name: descriptor.name,
            kind: descriptor.kind,
            dependencies: descriptor.dependencies,
            role: descriptor.role,
            plugin: descriptor.plugin,
            factory: descriptor.factory,
            slot: Mutex::new(slot),
            settled: Condvar::new(),
        }
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn info(&self) -> ComponentInfo {
        ComponentInfo {
            name: self.name.clone(),
            kind: self.kind,
            dependencies: self.dependencies.clone(),
            role: self.role.clone(),
            plugin: self.plugin.clone(),
            resolved: matches!(*self.lock_slot(), Slot::Ready(_)),
        }
    }
}

/// Read-only description of a registered component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentInfo {
    pub name: String,
    pub kind: ComponentKind,
    pub dependencies: Vec<String>,
    pub role: Option<String>,
    pub plugin: Option<String>,
    /// Whether the value has been produced (always true for value components)
    pub resolved: bool,
}

#[derive(Default)]
struct ComponentTable {
    by_name: HashMap<String, Arc<Component>>,
    order: Vec<String>,
}

struct InjectorInner {
    table: RwLock<ComponentTable>,
}

/// Shared component namespace for one registry. Cloning is cheap and every
/// clone sees the same components.
#[derive(Clone)]
pub struct ComponentInjector {
    inner: Arc<InjectorInner>,
}

/// Non-owning reference to an injector, stored as the `injector` component.
#[derive(Clone)]
pub struct InjectorHandle(Weak<InjectorInner>);

impl InjectorHandle {
    /// The injector, if it is still alive
    pub fn upgrade(&self) -> Option<ComponentInjector> {
        self.0.upgrade().map(|inner| ComponentInjector { inner })
    }
}

impl ComponentInjector {
    /// Create an injector pre-populated with the `injector` and `registry`
    /// components.
    pub fn new(registry: RegistryHandle) -> Self {
        debug!("creating injector");
        let injector = Self {
            inner: Arc::new(InjectorInner {
                table: RwLock::new(ComponentTable::default()),
            }),
        };
        injector.insert(ComponentDescriptor::value(INJECTOR_COMPONENT, injector.handle()));
        injector.insert(ComponentDescriptor::value(REGISTRY_COMPONENT, registry));
        injector
    }

    /// A weak handle to this injector
    pub fn handle(&self) -> InjectorHandle {
        InjectorHandle(Arc::downgrade(&self.inner))
    }

    fn insert(&self, descriptor: ComponentDescriptor) {
        let name = descriptor.name.clone();
        let mut table = self.inner.table.write().unwrap_or_else(PoisonError::into_inner);
        if table.by_name.insert(name.clone(), Arc::new(Component::from_descriptor(descriptor))).is_none() {
            table.order.push(name);
        }
    }

    /// Register a component.
    ///
    /// The descriptor is validated first. A name that is already taken is
    /// rejected unless the descriptor is marked `override_existing`.
    pub fn register(&self, descriptor: ComponentDescriptor) -> Result<(), ComponentError> {
        debug!("registering \"{}\"", descriptor.name);
        let validation = descriptor.validate();
        if !validation.is_valid() {
            warn!("rejecting component '{}': {}", descriptor.name, validation);
            return Err(ComponentError::InvalidDescriptor {
                name: descriptor.name,
                message: validation.to_string(),
            });
        }

        let name = descriptor.name.clone();
        let mut table = self.inner.table.write().unwrap_or_else(PoisonError::into_inner);
        if table.by_name.contains_key(&name) {
            if !descriptor.override_existing {
                return Err(ComponentError::AlreadyRegistered(name));
            }
            warn!("component '{}' overridden by {:?}", name, descriptor.plugin);
        } else {
            table.order.push(name.clone());
        }
        table.by_name.insert(name.clone(), Arc::new(Component::from_descriptor(descriptor)));
        debug!("registered \"{}\"", name);
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<Arc<Component>, ComponentError> {
        let table = self.inner.table.read().unwrap_or_else(PoisonError::into_inner);
        table
            .by_name
            .get(name)
            .cloned()
            .ok_or_else(|| ComponentError::UnknownComponent(name.to_string()))
    }

    /// Resolve `name`, running its factory (and its dependencies' factories,
    /// depth first) on first use.
    pub fn get(&self, name: &str) -> Result<ComponentValue, ComponentError> {
        self.check_graph(name)?;
        let value = self.resolve(name, &mut Vec::new())?;
        debug!("injecting \"{}\"", name);
        Ok(value)
    }

    /// Resolve `name` and downcast it to `T`
    pub fn get_as<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, ComponentError> {
        downcast_value(name, self.get(name)?)
    }

    /// Walk the declared dependency graph below `name` so that unknown
    /// names and cycles are reported before any factory runs.
    fn check_graph(&self, name: &str) -> Result<(), ComponentError> {
        let table = self.inner.table.read().unwrap_or_else(PoisonError::into_inner);
        let mut done = HashSet::new();
        let mut path = Vec::new();
        Self::visit(&table, name, &mut path, &mut done)
    }

    fn visit<'a>(
        table: &'a ComponentTable,
        name: &'a str,
        path: &mut Vec<&'a str>,
        done: &mut HashSet<&'a str>,
    ) -> Result<(), ComponentError> {
        if done.contains(name) {
            return Ok(());
        }
        if let Some(start) = path.iter().position(|n| *n == name) {
            let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
            cycle.push(name.to_string());
            return Err(ComponentError::CyclicDependency(cycle));
        }
        let component = table
            .by_name
            .get(name)
            .ok_or_else(|| ComponentError::UnknownComponent(name.to_string()))?;

        if !matches!(*component.lock_slot(), Slot::Ready(_)) {
            path.push(name);
            for dependency in &component.dependencies {
                Self::visit(table, dependency, path, done)?;
            }
            path.pop();
        }
        done.insert(name);
        Ok(())
    }

    fn resolve(&self, name: &str, path: &mut Vec<String>) -> Result<ComponentValue, ComponentError> {
        let component = self.lookup(name)?;
        let me = thread::current().id();
        {
            let mut slot = component.lock_slot();
            loop {
                match &*slot {
                    Slot::Ready(value) => return Ok(value.clone()),
                    Slot::Resolving(owner) if *owner == me => {
                        let mut cycle = path.clone();
                        cycle.push(name.to_string());
                        return Err(ComponentError::CyclicDependency(cycle));
                    }
                    Slot::Resolving(_) => {
                        slot = component.settled.wait(slot).unwrap_or_else(PoisonError::into_inner);
                    }
                    Slot::Pending => {
                        *slot = Slot::Resolving(me);
                        break;
                    }
                }
            }
        }

        path.push(name.to_string());
        let outcome = self.produce(&component, path);
        path.pop();

        let mut slot = component.lock_slot();
        *slot = match &outcome {
            Ok(value) => Slot::Ready(value.clone()),
            Err(_) => Slot::Pending,
        };
        component.settled.notify_all();
        outcome
    }

    fn produce(&self, component: &Component, path: &mut Vec<String>) -> Result<ComponentValue, ComponentError> {
        let factory = component
            .factory
            .as_ref()
            .ok_or_else(|| ComponentError::factory(&component.name, "component has neither value nor factory"))?;

        let mut values = Vec::with_capacity(component.dependencies.len());
        for dependency in &component.dependencies {
            values.push(self.resolve(dependency, path)?);
        }
        debug!("invoking {} for \"{}\"", component.kind, component.name);
        factory(&ResolvedDependencies::new(&component.name, component.dependencies.clone(), values))
    }

    /// Components satisfying `predicate`, in registration order
    pub fn filter<P>(&self, predicate: P) -> Vec<ComponentInfo>
    where
        P: Fn(&ComponentInfo) -> bool,
    {
        let table = self.inner.table.read().unwrap_or_else(PoisonError::into_inner);
        table
            .order
            .iter()
            .filter_map(|name| table.by_name.get(name))
            .map(|component| component.info())
            .filter(|info| predicate(info))
            .collect()
    }

    /// Resolve every component in `infos`, keeping their order
    pub fn values(&self, infos: &[ComponentInfo]) -> Result<Vec<ComponentValue>, ComponentError> {
        infos.iter().map(|info| self.get(&info.name)).collect()
    }

    /// Description of one component
    pub fn info(&self, name: &str) -> Option<ComponentInfo> {
        self.lookup(name).ok().map(|component| component.info())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_ok()
    }

    /// Names of all components in registration order
    pub fn names(&self) -> Vec<String> {
        let table = self.inner.table.read().unwrap_or_else(PoisonError::into_inner);
        table.order.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.table.read().unwrap_or_else(PoisonError::into_inner).order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
