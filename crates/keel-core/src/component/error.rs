//! # Component Injector Errors
//!
//! [`ComponentError`] covers every failure the injector can report: lookups
//! of names that were never registered, duplicate registrations, descriptors
//! that break the component contract, factory dependency cycles, factories
//! that fail, and typed lookups that hit a value of another type.
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComponentError {
    #[error("Unknown component \"{0}\"")]
    UnknownComponent(String),

    #[error("Component \"{0}\" is already registered")]
    AlreadyRegistered(String),

    #[error("Invalid component descriptor '{name}': {message}")]
    InvalidDescriptor { name: String, message: String },

    #[error("Circular component dependency detected: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    #[error("Factory for component '{name}' failed: {message}")]
    FactoryFailed {
        name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Component '{name}' is not of the requested type '{expected}'")]
    TypeMismatch { name: String, expected: &'static str },

    #[error("Dependency index {index} is out of range for component '{name}'")]
    MissingArgument { name: String, index: usize },

    #[error("Unknown module \"{0}\"")]
    UnknownModule(String),

    #[error("Plugin '{plugin}' has no base directory to load modules from")]
    NoBaseDirectory { plugin: String },

    #[error("Failed to read module directory '{path}': {source}")]
    ModuleDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ComponentError {
    /// A factory failure carrying only a message
    pub fn factory(name: impl Into<String>, message: impl Into<String>) -> Self {
        ComponentError::FactoryFailed {
            name: name.into(),
            message: message.into(),
            source: None,
        }
    }
}
