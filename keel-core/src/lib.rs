//! Shard-local core services for the Keel framework.
//!
//! Home of the dependency-injection container (type-indexed registry with
//! three service lifetimes, constructor injection and post-registration
//! patching), the yaml/env configuration layer, and the tracing bootstrap.
//! One container per shard; nothing here is shared across cores.

pub mod config;
pub mod container;
pub mod logging;

pub use config::{ConfigError, ConfigValue, FromConfigValue, KeelConfig};
pub use container::{
    Container, ContainerError, Injectable, Lifetime, ServiceDescriptor, ServiceStorage,
};
pub use logging::init_tracing;
