//! Pipewright Config
//!
//! This crate contains the serializable configuration types for pipewright:
//! the task model (built-in and pluggable tasks with their on-cancel tasks)
//! and the pipeline/template tree those tasks live in.
//!
//! Configuration is persisted as a single JSON document. Its MD5 digest is the
//! version used for optimistic-concurrency saves.
//!
//! Tasks carry a field-level [`ErrorMap`] that is only filled by a validation
//! pass and is never persisted.

mod cruise;
mod errors;
mod kinds;
mod pluggable;
mod schema;
mod task;
mod value;

pub use cruise::{
  ConfigOwner, CruiseConfig, JobConfig, JobLocation, PipelineConfig, StageConfig, TemplateConfig,
};
pub use errors::{ErrorMap, FieldError};
pub use kinds::{AntTask, ExecTask, FetchTask, NantTask, RakeTask};
pub use pluggable::{ConfigurationProperty, MASKED_VALUE, PluggableTask};
pub use schema::{PluginTaskSchema, SchemaProperty};
pub use task::{RunIfCondition, Task, TaskErrors, TaskKind, TaskType};
pub use value::{AttributeMap, is_truthy};
