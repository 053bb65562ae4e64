use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single validation message attached to a named field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
  pub field: String,
  pub message: String,
}

impl FieldError {
  pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      field: field.into(),
      message: message.into(),
    }
  }
}

/// Field name to ordered list of validation messages.
///
/// Serializes as a plain JSON object: `{"command": ["Command cannot be empty"]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorMap(BTreeMap<String, Vec<String>>);

impl ErrorMap {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append a message to the bucket for `field`.
  pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
    self.0.entry(field.into()).or_default().push(message.into());
  }

  /// Messages recorded for `field`, empty if none.
  pub fn get(&self, field: &str) -> &[String] {
    self.0.get(field).map(|v| v.as_slice()).unwrap_or(&[])
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Number of fields that carry at least one message.
  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn clear(&mut self) {
    self.0.clear();
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
    self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
  }
}

impl Extend<FieldError> for ErrorMap {
  fn extend<T: IntoIterator<Item = FieldError>>(&mut self, iter: T) {
    for error in iter {
      self.add(error.field, error.message);
    }
  }
}

impl FromIterator<FieldError> for ErrorMap {
  fn from_iter<T: IntoIterator<Item = FieldError>>(iter: T) -> Self {
    let mut map = Self::new();
    map.extend(iter);
    map
  }
}
