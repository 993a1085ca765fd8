//! # Keel Kernel
//!
//! The kernel holds what every other module builds on:
//!
//! - **[`bootstrap`]**: the [`Application`](bootstrap::Application), which owns
//!   one plugin registry and drives it through the phase pipeline under the
//!   configured failure policy.
//! - **[`lifecycle`]**: lifecycle identity, schema validation and the hook
//!   trait shared by plugins.
//! - **[`error`]**: the crate-wide [`Error`](error::Error) and
//!   [`Result`](error::Result).
//! - **[`constants`]**: names and versions shared across the crate.
pub mod bootstrap;
pub mod constants;
pub mod error;
pub mod lifecycle;
