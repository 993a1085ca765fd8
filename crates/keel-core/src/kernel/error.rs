//! # Keel Core Kernel Errors
//!
//! Defines the crate-wide [`Error`] type and the [`Result`] alias.
//!
//! Each subsystem owns a typed error enum ([`PluginSystemError`],
//! [`ComponentError`], [`ConfigError`]); this module folds them into one
//! [`Error`] through `#[from]` conversions so `?` works across subsystem
//! boundaries. Application-level phase aborts are reported through
//! [`Error::KernelLifecycleError`].
use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::component::error::ComponentError;
use crate::config::ConfigError;
use crate::plugin_system::dependency::DependencyError;
use crate::plugin_system::error::PluginSystemError;

/// Custom error type for the keel runtime
#[derive(Debug, ThisError)]
pub enum Error {
    /// Specific, typed plugin system error
    #[error("Plugin system error: {0}")]
    PluginSystem(#[from] PluginSystemError),

    /// Component injector error
    #[error("Component error: {0}")]
    Component(#[from] ComponentError),

    /// Configuration loading error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error occurring during a specific application lifecycle phase.
    #[error("Kernel lifecycle error during {phase}: {message}")]
    KernelLifecycleError {
        phase: KernelLifecyclePhase,
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Represents a specific phase of the registry pipeline as driven by the
/// [`Application`](crate::kernel::bootstrap::Application).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ThisError)]
pub enum KernelLifecyclePhase {
    #[error("Discover")]
    Discover,
    #[error("Register")]
    Register,
    #[error("Resolve")]
    Resolve,
    #[error("Prioritize")]
    Prioritize,
    #[error("Initialize")]
    Initialize,
    #[error("Start")]
    Start,
    #[error("Stop")]
    Stop,
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl From<DependencyError> for Error {
    fn from(err: DependencyError) -> Self {
        Error::PluginSystem(PluginSystemError::DependencyResolution(err))
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl Error {
    /// Wraps `source` as the cause of an aborted application phase.
    pub fn lifecycle(phase: KernelLifecyclePhase, message: impl Into<String>, source: Option<Error>) -> Self {
        Error::KernelLifecycleError {
            phase,
            message: message.into(),
            source: source.map(Box::new),
        }
    }
}
