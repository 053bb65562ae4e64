use serde::{Deserialize, Serialize};

use pipewright_config::{PluginTaskSchema, SchemaProperty};

/// Metadata describing an installed task plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
  /// Plugin id, e.g. "com.example.curl"
  pub id: String,

  /// Plugin version, e.g. "1.2.0"
  pub version: String,

  /// Short description of what the task does
  #[serde(default)]
  pub description: String,

  /// Configuration keys the task accepts, in display order
  #[serde(default)]
  pub properties: Vec<SchemaProperty>,
}

impl PluginManifest {
  /// Returns the directory name for this plugin: "id--version".
  ///
  /// Example: "com.example.curl" version "1.2.0"
  /// becomes "com.example.curl--1.2.0"
  pub fn dir_name(&self) -> String {
    format!("{}--{}", self.id, self.version)
  }

  pub fn schema(&self) -> PluginTaskSchema {
    PluginTaskSchema {
      plugin_id: self.id.clone(),
      plugin_version: self.version.clone(),
      properties: self.properties.clone(),
    }
  }
}
