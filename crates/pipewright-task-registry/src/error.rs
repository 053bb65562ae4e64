use thiserror::Error;

/// Errors that can occur when working with the task registry.
#[derive(Debug, Error)]
pub enum RegistryError {
  /// Neither a built-in task type nor a registered plugin id.
  #[error("unknown task type: {name}")]
  UnknownTaskType { name: String },

  /// Plugin ids share the namespace of built-in type names.
  #[error("plugin id '{plugin_id}' is reserved for a built-in task type")]
  ReservedPluginId { plugin_id: String },

  /// IO error when reading plugin manifests.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// Failed to parse manifest JSON.
  #[error("invalid manifest: {0}")]
  InvalidManifest(#[from] serde_json::Error),
}

/// A plugin validation hook failed instead of returning field errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("plugin '{plugin_id}' failed: {message}")]
pub struct PluginError {
  pub plugin_id: String,
  pub message: String,
}

impl PluginError {
  pub fn new(plugin_id: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      plugin_id: plugin_id.into(),
      message: message.into(),
    }
  }
}
