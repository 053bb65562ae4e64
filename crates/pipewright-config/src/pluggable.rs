use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::PluginTaskSchema;
use crate::value::{Scalar, scalar};

/// Shown in place of a secure plaintext value when a task is echoed back.
pub const MASKED_VALUE: &str = "********";

/// One configured key of a pluggable task.
///
/// Secure keys are stored as `encrypted_value`. A submission may carry a
/// plaintext `value` for a secure key, which is sealed before persisting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationProperty {
  pub key: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub value: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub encrypted_value: Option<String>,
}

impl ConfigurationProperty {
  pub fn new(key: impl Into<String>) -> Self {
    Self {
      key: key.into(),
      value: None,
      encrypted_value: None,
    }
  }

  /// Error bucket for the plaintext value, which is the key itself.
  pub fn value_field(&self) -> String {
    self.key.clone()
  }

  /// Error bucket for the encrypted value: `{key}.encryptedValue`.
  pub fn encrypted_value_field(&self) -> String {
    format!("{}.encryptedValue", self.key)
  }

  /// True when neither a plaintext nor an encrypted value is present.
  pub fn is_blank(&self) -> bool {
    let blank = |v: &Option<String>| v.as_deref().is_none_or(|s| s.trim().is_empty());
    blank(&self.value) && blank(&self.encrypted_value)
  }

  fn assign(&mut self, value: &Value) -> bool {
    match value {
      Value::Object(fields) => {
        let plain = fields.get("value");
        let encrypted = fields
          .get("encryptedValue")
          .or_else(|| fields.get("encrypted_value"));
        self.value = plain.and_then(non_blank);
        self.encrypted_value = encrypted.and_then(non_blank);
        true
      }
      other => match scalar(other) {
        Some(Scalar::Set(s)) => {
          self.value = Some(s);
          self.encrypted_value = None;
          true
        }
        Some(Scalar::Clear) => {
          self.value = None;
          self.encrypted_value = None;
          true
        }
        None => false,
      },
    }
  }
}

fn non_blank(value: &Value) -> Option<String> {
  match scalar(value) {
    Some(Scalar::Set(s)) if !s.is_empty() => Some(s),
    _ => None,
  }
}

/// A task whose type and configuration keys come from a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluggableTask {
  pub plugin_id: String,
  pub plugin_version: String,
  #[serde(default)]
  configuration: Vec<ConfigurationProperty>,

  /// Schema copied from the registry when this instance was constructed.
  /// Unregistering the plugin later does not affect it.
  #[serde(skip)]
  schema: Option<PluginTaskSchema>,
}

impl PluggableTask {
  /// Default instance: every schema key present, none set.
  pub fn from_schema(schema: PluginTaskSchema) -> Self {
    let configuration = schema
      .properties
      .iter()
      .map(|p| ConfigurationProperty::new(&p.key))
      .collect();

    Self {
      plugin_id: schema.plugin_id.clone(),
      plugin_version: schema.plugin_version.clone(),
      configuration,
      schema: Some(schema),
    }
  }

  /// Attach a schema snapshot to an instance deserialized without one.
  /// Keys the schema names but the configuration lacks are added unset;
  /// stored keys the schema no longer names are kept.
  pub fn attach_schema(&mut self, schema: PluginTaskSchema) {
    for property in &schema.properties {
      if self.property(&property.key).is_none() {
        self
          .configuration
          .push(ConfigurationProperty::new(&property.key));
      }
    }
    self.schema = Some(schema);
  }

  pub fn schema(&self) -> Option<&PluginTaskSchema> {
    self.schema.as_ref()
  }

  pub fn configuration(&self) -> &[ConfigurationProperty] {
    &self.configuration
  }

  pub fn property(&self, key: &str) -> Option<&ConfigurationProperty> {
    self.configuration.iter().find(|p| p.key == key)
  }

  /// Whether the schema snapshot marks `key` as secure.
  pub fn is_secure(&self, key: &str) -> bool {
    self
      .schema
      .as_ref()
      .and_then(|s| s.property(key))
      .is_some_and(|p| p.secure)
  }

  /// Replace plaintext values of secure keys with the output of `seal`.
  pub fn seal_secure_values<E>(
    &mut self,
    mut seal: impl FnMut(&str) -> Result<String, E>,
  ) -> Result<(), E> {
    let Some(schema) = &self.schema else {
      return Ok(());
    };

    for property in &mut self.configuration {
      let secure = schema.property(&property.key).is_some_and(|p| p.secure);
      if !secure || property.encrypted_value.is_some() {
        continue;
      }
      if let Some(plain) = property.value.take() {
        property.encrypted_value = Some(seal(&plain)?);
      }
    }
    Ok(())
  }

  /// Hide plaintext values of secure keys, for echoing a task that was not
  /// saved. Encrypted values are left as they are.
  pub fn mask_secure_values(&mut self) {
    let Some(schema) = &self.schema else {
      return;
    };

    for property in &mut self.configuration {
      let secure = schema.property(&property.key).is_some_and(|p| p.secure);
      if secure && property.value.is_some() {
        property.value = Some(MASKED_VALUE.to_string());
      }
    }
  }

  /// Assign a submitted value to a known key. Keys missing from the schema
  /// snapshot (or from the stored configuration, when loaded without one)
  /// are not recognized.
  pub(crate) fn assign(&mut self, key: &str, value: &Value) -> bool {
    let known = match &self.schema {
      Some(schema) => schema.property(key).is_some(),
      None => self.property(key).is_some(),
    };
    if !known {
      return false;
    }

    if let Some(property) = self.configuration.iter_mut().find(|p| p.key == key) {
      return property.assign(value);
    }

    let mut property = ConfigurationProperty::new(key);
    let assigned = property.assign(value);
    if assigned {
      self.configuration.push(property);
    }
    assigned
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::schema::SchemaProperty;
  use serde_json::json;

  fn curl_schema() -> PluginTaskSchema {
    PluginTaskSchema::new("com.example.curl", "1.2.0")
      .with_property(SchemaProperty::new("url").required())
      .with_property(SchemaProperty::new("token").secure())
  }

  #[test]
  fn test_from_schema_lists_every_key_empty() {
    let task = PluggableTask::from_schema(curl_schema());

    assert_eq!(task.plugin_version, "1.2.0");
    assert_eq!(task.configuration().len(), 2);
    assert!(task.configuration().iter().all(ConfigurationProperty::is_blank));
  }

  #[test]
  fn test_assign_unknown_key_is_ignored() {
    let mut task = PluggableTask::from_schema(curl_schema());
    assert!(!task.assign("proxy", &json!("http://proxy")));
    assert!(task.property("proxy").is_none());
  }

  #[test]
  fn test_attach_schema_after_load() {
    let stored = json!({
      "pluginId": "com.example.curl",
      "pluginVersion": "1.2.0",
      "configuration": [{"key": "token", "encryptedValue": "AES:abc:def"}]
    });
    let mut task: PluggableTask = serde_json::from_value(stored).unwrap();
    assert!(task.schema().is_none());
    assert!(!task.is_secure("token"));

    task.attach_schema(curl_schema());

    assert!(task.is_secure("token"));
    assert!(task.property("url").unwrap().is_blank());
    assert_eq!(
      task.property("token").unwrap().encrypted_value.as_deref(),
      Some("AES:abc:def")
    );
    assert!(task.assign("url", &json!("https://example.com")));
  }

  #[test]
  fn test_assign_object_keeps_both_values() {
    let mut task = PluggableTask::from_schema(curl_schema());
    assert!(task.assign(
      "token",
      &json!({"value": "secret", "encrypted_value": "AES:abc:def"})
    ));

    let token = task.property("token").unwrap();
    assert_eq!(token.value.as_deref(), Some("secret"));
    assert_eq!(token.encrypted_value.as_deref(), Some("AES:abc:def"));
  }

  #[test]
  fn test_seal_secure_values_only_touches_secure_keys() {
    let mut task = PluggableTask::from_schema(curl_schema());
    task.assign("url", &json!("https://example.com"));
    task.assign("token", &json!("secret"));

    task
      .seal_secure_values(|plain| Ok::<_, ()>(format!("sealed({plain})")))
      .unwrap();

    let url = task.property("url").unwrap();
    assert_eq!(url.value.as_deref(), Some("https://example.com"));
    let token = task.property("token").unwrap();
    assert_eq!(token.value, None);
    assert_eq!(token.encrypted_value.as_deref(), Some("sealed(secret)"));
  }

  #[test]
  fn test_mask_secure_values_hides_plaintext() {
    let mut task = PluggableTask::from_schema(curl_schema());
    task.assign("url", &json!("https://example.com"));
    task.assign("token", &json!({"value": "secret", "encryptedValue": "AES:abc:def"}));

    task.mask_secure_values();

    assert_eq!(
      task.property("url").unwrap().value.as_deref(),
      Some("https://example.com")
    );
    let token = task.property("token").unwrap();
    assert_eq!(token.value.as_deref(), Some(MASKED_VALUE));
    assert_eq!(token.encrypted_value.as_deref(), Some("AES:abc:def"));
  }
}
