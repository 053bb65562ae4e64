use pipewright_config::AttributeMap;
use pipewright_resolver::{HAS_CANCEL_TASK, ON_CANCEL_CONFIG, ON_CANCEL_OPTION};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A task form submission.
///
/// The on-cancel markers may be given at the top level or inside
/// `attributes`; top-level values win.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSubmission {
  #[serde(rename = "type", default)]
  pub task_type: String,
  #[serde(default)]
  pub attributes: AttributeMap,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub has_cancel_task: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub on_cancel_config: Option<Value>,
}

impl TaskSubmission {
  pub fn new(task_type: impl Into<String>, attributes: AttributeMap) -> Self {
    Self {
      task_type: task_type.into(),
      attributes,
      ..Default::default()
    }
  }

  /// Attach an on-cancel task of `option` with its attributes.
  pub fn with_on_cancel(mut self, option: &str, attributes: AttributeMap) -> Self {
    let mut config = AttributeMap::new();
    config.insert(ON_CANCEL_OPTION.to_string(), Value::from(option));
    config.insert(format!("{option}OnCancel"), Value::Object(attributes));
    self.has_cancel_task = Some(Value::Bool(true));
    self.on_cancel_config = Some(Value::Object(config));
    self
  }

  /// Attributes with the top-level on-cancel markers folded in.
  pub fn merged_attributes(&self) -> AttributeMap {
    let mut merged = self.attributes.clone();
    if let Some(has_cancel_task) = &self.has_cancel_task {
      merged.insert(HAS_CANCEL_TASK.to_string(), has_cancel_task.clone());
    }
    if let Some(on_cancel_config) = &self.on_cancel_config {
      merged.insert(ON_CANCEL_CONFIG.to_string(), on_cancel_config.clone());
    }
    merged
  }
}
