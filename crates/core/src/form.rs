//! Form-shape profile state.
//!
//! [`FormData`] is what the wizard edits: a flat JSON object keyed by
//! field name where list fields are comma-joined strings and the score
//! map is a `"key: value, key: value"` string. Absent keys and `null`
//! both mean "never answered".

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Flat, form-shaped profile record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormData(Map<String, Value>);

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw value of a field, `None` when the key was never written.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// String value of a field, if it holds one.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Boolean value of a field, if it holds one.
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.0.get(name).and_then(Value::as_bool)
    }

    /// Write a value, normalizing the empty string to `null`.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let value = match value {
            Value::String(s) if s.is_empty() => Value::Null,
            other => other,
        };
        self.0.insert(name.into(), value);
    }

    /// Remove a field entirely.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    /// Whether the field is unanswered: absent, `null`, blank text, or an
    /// empty list.
    pub fn is_blank(&self, name: &str) -> bool {
        match self.0.get(name) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(Value::Array(a)) => a.is_empty(),
            Some(_) => false,
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for FormData {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_string_is_stored_as_null() {
        let mut form = FormData::new();
        form.set("nationality", json!(""));
        assert_eq!(form.get("nationality"), Some(&Value::Null));
        assert!(form.is_blank("nationality"));
    }

    #[test]
    fn blank_covers_whitespace_and_empty_lists() {
        let mut form = FormData::new();
        form.set("bio", json!("   "));
        form.set("cities_covered", json!([]));
        form.set("age", json!(0));
        assert!(form.is_blank("bio"));
        assert!(form.is_blank("cities_covered"));
        assert!(form.is_blank("never_written"));
        assert!(!form.is_blank("age"));
    }

    #[test]
    fn serializes_as_plain_object() {
        let mut form = FormData::new();
        form.set("skills", json!("rust, go"));
        assert_eq!(serde_json::to_value(&form).unwrap(), json!({ "skills": "rust, go" }));
    }
}
