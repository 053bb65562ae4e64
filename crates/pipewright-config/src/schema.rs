use serde::{Deserialize, Serialize};

/// One configuration key declared by a plugin task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaProperty {
  pub key: String,

  /// Secure values are stored encrypted.
  #[serde(default)]
  pub secure: bool,

  #[serde(default)]
  pub required: bool,
}

impl SchemaProperty {
  pub fn new(key: impl Into<String>) -> Self {
    Self {
      key: key.into(),
      secure: false,
      required: false,
    }
  }

  pub fn secure(mut self) -> Self {
    self.secure = true;
    self
  }

  pub fn required(mut self) -> Self {
    self.required = true;
    self
  }
}

/// Configuration schema of a plugin-supplied task type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginTaskSchema {
  /// Plugin id, e.g. "com.example.curl". Used as the task type name.
  pub plugin_id: String,

  pub plugin_version: String,

  /// Declared keys in display order.
  #[serde(default)]
  pub properties: Vec<SchemaProperty>,
}

impl PluginTaskSchema {
  pub fn new(plugin_id: impl Into<String>, plugin_version: impl Into<String>) -> Self {
    Self {
      plugin_id: plugin_id.into(),
      plugin_version: plugin_version.into(),
      properties: Vec::new(),
    }
  }

  pub fn with_property(mut self, property: SchemaProperty) -> Self {
    self.properties.push(property);
    self
  }

  pub fn property(&self, key: &str) -> Option<&SchemaProperty> {
    self.properties.iter().find(|p| p.key == key)
  }
}
