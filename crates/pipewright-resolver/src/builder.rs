use pipewright_config::{AttributeMap, Task, is_truthy};
use pipewright_task_registry::{RegistryError, TaskRegistry};
use serde_json::Value;
use tracing::trace;

/// Marker attribute: a truthy value means the submission carries an on-cancel task.
pub const HAS_CANCEL_TASK: &str = "hasCancelTask";
/// Nested object holding the on-cancel choice and its attributes.
pub const ON_CANCEL_CONFIG: &str = "onCancelConfig";
/// Key inside [`ON_CANCEL_CONFIG`] naming the on-cancel task type.
pub const ON_CANCEL_OPTION: &str = "onCancelOption";

/// Builds tasks from submitted attributes.
pub struct TaskBuilder<'a> {
  registry: &'a TaskRegistry,
}

impl<'a> TaskBuilder<'a> {
  pub fn new(registry: &'a TaskRegistry) -> Self {
    Self { registry }
  }

  /// Construct a fresh task of `task_type` and merge `attributes` into it.
  pub fn build(&self, task_type: &str, attributes: &AttributeMap) -> Result<Task, RegistryError> {
    let mut task = self.registry.task_instance_for(task_type)?;
    self.merge(&mut task, attributes)?;
    Ok(task)
  }

  /// Merge submitted attributes into `task`.
  ///
  /// Known keys are assigned, unknown keys are dropped. The on-cancel task is
  /// rebuilt from the submission every time: a falsy or missing
  /// [`HAS_CANCEL_TASK`] clears it, otherwise a new task of the chosen type
  /// replaces whatever was attached before.
  pub fn merge(&self, task: &mut Task, attributes: &AttributeMap) -> Result<(), RegistryError> {
    for (key, value) in attributes {
      if key == HAS_CANCEL_TASK || key == ON_CANCEL_CONFIG {
        continue;
      }
      if !task.assign(key, value) {
        trace!(task_type = %task.task_type(), key = %key, "ignoring unknown attribute");
      }
    }

    let on_cancel = if is_truthy(attributes.get(HAS_CANCEL_TASK)) {
      self.build_on_cancel(attributes.get(ON_CANCEL_CONFIG))?
    } else {
      None
    };
    task.set_on_cancel(on_cancel);
    Ok(())
  }

  fn build_on_cancel(&self, config: Option<&Value>) -> Result<Option<Task>, RegistryError> {
    let Some(Value::Object(config)) = config else {
      return Ok(None);
    };
    let Some(option) = config
      .get(ON_CANCEL_OPTION)
      .and_then(Value::as_str)
      .map(str::trim)
      .filter(|s| !s.is_empty())
    else {
      return Ok(None);
    };

    let empty = AttributeMap::new();
    let attributes = match config.get(&format!("{option}OnCancel")) {
      Some(Value::Object(attributes)) => attributes,
      _ => &empty,
    };

    self.build(option, attributes).map(Some)
  }
}
