use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use pipewright_config::{FieldError, PluggableTask, PluginTaskSchema, Task, TaskKind, TaskType};
use tracing::{debug, info, warn};

use crate::error::{PluginError, RegistryError};
use crate::fs_source::PluginSource;

/// Validation hook supplied by a task plugin.
///
/// Called with the fully merged task. Field errors are returned as values;
/// `Err` means the plugin itself failed and is reported separately from the
/// task's field errors.
pub trait PluginTaskValidator: Send + Sync {
  fn validate(&self, task: &PluggableTask) -> Result<Vec<FieldError>, PluginError>;
}

#[derive(Default)]
struct Plugins {
  schemas: HashMap<String, PluginTaskSchema>,
  validators: HashMap<String, Arc<dyn PluginTaskValidator>>,
}

/// Lookup from task type name to a fresh prototype task.
///
/// Safe to share across threads. Instances never reference registry state:
/// pluggable tasks receive a copy of their plugin's schema.
#[derive(Default)]
pub struct TaskRegistry {
  plugins: RwLock<Plugins>,
}

impl TaskRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Construct a default task for a built-in type name or plugin id.
  pub fn task_instance_for(&self, type_name: &str) -> Result<Task, RegistryError> {
    if let Some(kind) = TaskType::built_in(type_name).and_then(TaskKind::default_for) {
      return Ok(Task::new(kind));
    }

    let plugins = self.plugins.read().unwrap_or_else(PoisonError::into_inner);
    match plugins.schemas.get(type_name) {
      Some(schema) => Ok(Task::new(TaskKind::Pluggable(PluggableTask::from_schema(
        schema.clone(),
      )))),
      None => Err(RegistryError::UnknownTaskType {
        name: type_name.to_string(),
      }),
    }
  }

  /// Register (or replace) a plugin task schema, keyed by its plugin id.
  pub fn register_plugin(&self, schema: PluginTaskSchema) -> Result<(), RegistryError> {
    if TaskType::built_in(&schema.plugin_id).is_some() {
      return Err(RegistryError::ReservedPluginId {
        plugin_id: schema.plugin_id,
      });
    }

    info!(
      plugin_id = %schema.plugin_id,
      plugin_version = %schema.plugin_version,
      properties = schema.properties.len(),
      "registered task plugin"
    );

    let mut plugins = self.plugins.write().unwrap_or_else(PoisonError::into_inner);
    plugins.schemas.insert(schema.plugin_id.clone(), schema);
    Ok(())
  }

  /// Install the validation hook for a plugin id.
  pub fn register_validator(
    &self,
    plugin_id: impl Into<String>,
    validator: Arc<dyn PluginTaskValidator>,
  ) {
    let plugin_id = plugin_id.into();
    debug!(plugin_id = %plugin_id, "registered plugin validator");
    let mut plugins = self.plugins.write().unwrap_or_else(PoisonError::into_inner);
    plugins.validators.insert(plugin_id, validator);
  }

  /// Remove a plugin and its validator. Returns whether it was registered.
  /// Tasks already built from it keep their schema copy.
  pub fn unregister_plugin(&self, plugin_id: &str) -> bool {
    let mut plugins = self.plugins.write().unwrap_or_else(PoisonError::into_inner);
    plugins.validators.remove(plugin_id);
    let removed = plugins.schemas.remove(plugin_id).is_some();
    if removed {
      info!(plugin_id = %plugin_id, "unregistered task plugin");
    }
    removed
  }

  /// Give pluggable tasks loaded from storage (and their on-cancel chain)
  /// the current schema of their plugin. Tasks of unregistered plugins are
  /// left without one.
  pub fn attach_schemas(&self, task: &mut Task) {
    let mut current = Some(task);
    while let Some(task) = current {
      if let Some(pluggable) = task.pluggable_mut()
        && pluggable.schema().is_none()
        && let Some(schema) = self.schema(&pluggable.plugin_id)
      {
        pluggable.attach_schema(schema);
      }
      current = task.on_cancel_mut();
    }
  }

  pub fn schema(&self, plugin_id: &str) -> Option<PluginTaskSchema> {
    let plugins = self.plugins.read().unwrap_or_else(PoisonError::into_inner);
    plugins.schemas.get(plugin_id).cloned()
  }

  pub fn validator_for(&self, plugin_id: &str) -> Option<Arc<dyn PluginTaskValidator>> {
    let plugins = self.plugins.read().unwrap_or_else(PoisonError::into_inner);
    plugins.validators.get(plugin_id).cloned()
  }

  /// Built-in type names followed by registered plugin ids (sorted).
  pub fn task_types(&self) -> Vec<String> {
    let mut plugin_ids: Vec<String> = {
      let plugins = self.plugins.read().unwrap_or_else(PoisonError::into_inner);
      plugins.schemas.keys().cloned().collect()
    };
    plugin_ids.sort();

    TaskType::BUILT_IN
      .iter()
      .map(|t| t.as_str().to_string())
      .chain(plugin_ids)
      .collect()
  }

  /// Register every plugin the source provides. Plugins that cannot be
  /// registered are skipped with a warning. Returns how many were loaded.
  pub async fn load_from<S: PluginSource + ?Sized>(
    &self,
    source: &S,
  ) -> Result<usize, RegistryError> {
    let manifests = source.list().await?;
    let mut count = 0;
    for manifest in manifests {
      match self.register_plugin(manifest.schema()) {
        Ok(()) => count += 1,
        Err(err) => {
          warn!(
            plugin_id = %manifest.id,
            plugin_version = %manifest.version,
            error = %err,
            "skipping task plugin"
          );
        }
      }
    }
    Ok(count)
  }
}
