//! Helpers for reading submitted form attributes.
//!
//! Submissions arrive as loosely typed JSON objects. Scalar fields accept
//! strings as-is and stringify numbers and booleans; `null` clears a field;
//! arrays and objects are not scalars and are ignored by scalar fields.

use serde_json::Value;

/// Submitted attributes keyed by field name.
pub type AttributeMap = serde_json::Map<String, Value>;

/// Outcome of reading a submitted value as a scalar.
pub(crate) enum Scalar {
  /// A concrete value (possibly blank).
  Set(String),
  /// An explicit `null`.
  Clear,
}

pub(crate) fn scalar(value: &Value) -> Option<Scalar> {
  match value {
    Value::String(s) => Some(Scalar::Set(s.clone())),
    Value::Number(n) => Some(Scalar::Set(n.to_string())),
    Value::Bool(b) => Some(Scalar::Set(b.to_string())),
    Value::Null => Some(Scalar::Clear),
    Value::Array(_) | Value::Object(_) => None,
  }
}

/// Assign a scalar into an optional field. Blank strings clear the field.
pub(crate) fn assign_optional(field: &mut Option<String>, value: &Value) -> bool {
  match scalar(value) {
    Some(Scalar::Set(s)) if s.trim().is_empty() => *field = None,
    Some(Scalar::Set(s)) => *field = Some(s),
    Some(Scalar::Clear) => *field = None,
    None => return false,
  }
  true
}

/// Assign a scalar into a plain string field. `null` empties the field.
pub(crate) fn assign_string(field: &mut String, value: &Value) -> bool {
  match scalar(value) {
    Some(Scalar::Set(s)) => *field = s,
    Some(Scalar::Clear) => field.clear(),
    None => return false,
  }
  true
}

/// Form-style truthiness: `"1"`, `"true"`, `true` and non-zero numbers.
pub fn is_truthy(value: Option<&Value>) -> bool {
  match value {
    Some(Value::Bool(b)) => *b,
    Some(Value::String(s)) => matches!(s.trim(), "1" | "true" | "on" | "yes"),
    Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
    _ => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_is_truthy() {
    assert!(is_truthy(Some(&json!("1"))));
    assert!(is_truthy(Some(&json!("true"))));
    assert!(is_truthy(Some(&json!(true))));
    assert!(is_truthy(Some(&json!(1))));
    assert!(!is_truthy(Some(&json!("0"))));
    assert!(!is_truthy(Some(&json!(false))));
    assert!(!is_truthy(Some(&json!(null))));
    assert!(!is_truthy(None));
  }

  #[test]
  fn test_assign_optional_blank_clears() {
    let mut field = Some("build.xml".to_string());
    assert!(assign_optional(&mut field, &json!("  ")));
    assert_eq!(field, None);
  }

  #[test]
  fn test_assign_optional_ignores_objects() {
    let mut field = Some("build.xml".to_string());
    assert!(!assign_optional(&mut field, &json!({"nested": 1})));
    assert_eq!(field.as_deref(), Some("build.xml"));
  }

  #[test]
  fn test_assign_string_stringifies_numbers() {
    let mut field = String::new();
    assert!(assign_string(&mut field, &json!(42)));
    assert_eq!(field, "42");
  }
}
