pub mod descriptor;
pub mod error;
pub mod injector;
pub mod registrar;

pub use descriptor::{ComponentDescriptor, ComponentKind, ComponentValue, FactoryFn, ResolvedDependencies};
pub use error::ComponentError;
pub use injector::{ComponentInfo, ComponentInjector, InjectorHandle};
pub use registrar::{Registrar, RegistrarHandle, RoleRegistrar};
