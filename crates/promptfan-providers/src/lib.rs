//! Provider abstraction for promptfan.
//!
//! [`Provider`] is the single capability every backend exposes: list its
//! models and generate text for a prompt. [`ProviderRegistry`] maps provider
//! names from configuration to factories, so deployments pick backends by
//! name and tests can register doubles.

pub mod backends;
pub mod provider;
pub mod registry;

pub use provider::Provider;
pub use registry::{ProviderFactory, ProviderRegistry};
