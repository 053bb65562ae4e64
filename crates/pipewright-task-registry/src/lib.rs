//! Pipewright Task Registry
//!
//! Maps task type names to prototype task instances. Built-in types (ant,
//! nant, rake, exec, fetch) are always available; pluggable types are added
//! and removed at runtime by plugin id, optionally together with a validation
//! hook supplied by the plugin.

mod error;
mod fs_source;
mod manifest;
mod registry;

pub use error::{PluginError, RegistryError};
pub use fs_source::{FsPluginSource, PluginSource};
pub use manifest::PluginManifest;
pub use pipewright_config::{PluginTaskSchema, SchemaProperty};
pub use registry::{PluginTaskValidator, TaskRegistry};
