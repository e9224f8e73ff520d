//! Conversion between the form shape and the backend shape of the
//! intake profile.
//!
//! - Form shape ([`FormData`]): list fields are comma-joined strings and
//!   `language_scores` is a `"key: value, key: value"` string.
//! - Backend shape ([`IntakeProfile`]): list fields are arrays of trimmed,
//!   non-empty strings (or `null`), and `language_scores` is an ordered
//!   string map (or `null`).
//!
//! An empty list and a never-answered field both become `null` in the
//! backend shape.

use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::fields::{flag_value, is_metadata, FieldKind, FieldSpec};
use crate::form::FormData;
use crate::profile::{IntakeProfile, LanguageScores};

/// Separator used when joining list items back into form text.
pub const LIST_SEPARATOR: &str = ", ";

// ---------------------------------------------------------------------------
// List helpers
// ---------------------------------------------------------------------------

/// Split comma-separated text into trimmed, non-empty items.
pub fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Join list items for display in a text input.
pub fn join_list<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

// ---------------------------------------------------------------------------
// Language score helpers
// ---------------------------------------------------------------------------

/// Parse language scores typed by the user.
///
/// A JSON object is taken as-is (non-string values are stringified).
/// Anything else is read as `"key: value"` pairs separated by commas;
/// pairs without a colon or with an empty side are dropped. Returns
/// `None` when no pair survives.
pub fn parse_language_scores(text: &str) -> Option<LanguageScores> {
    if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(text) {
        return scores_from_object(&obj);
    }

    let scores: LanguageScores = text
        .split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once(':')?;
            let (key, value) = (key.trim(), value.trim());
            (!key.is_empty() && !value.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect();

    (!scores.is_empty()).then_some(scores)
}

/// Render language scores as `"key: value, key: value"`.
pub fn format_language_scores(scores: &LanguageScores) -> Option<String> {
    if scores.is_empty() {
        return None;
    }
    Some(
        scores
            .iter()
            .map(|(key, value)| format!("{key}: {value}"))
            .collect::<Vec<_>>()
            .join(LIST_SEPARATOR),
    )
}

fn scores_from_object(obj: &Map<String, Value>) -> Option<LanguageScores> {
    let scores: LanguageScores = obj
        .iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Value::Null => return None,
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            };
            (!value.is_empty()).then(|| (key.trim().to_string(), value))
        })
        .collect();
    (!scores.is_empty()).then_some(scores)
}

// ---------------------------------------------------------------------------
// Form -> backend
// ---------------------------------------------------------------------------

/// Convert form data into the backend's flat JSON object.
///
/// Metadata keys are stripped, unknown keys are dropped, conditional
/// fields whose gate is closed are cleared, and every value is coerced
/// to the kind recorded in the field catalog.
pub fn to_backend_value(form: &FormData) -> Result<Map<String, Value>, CoreError> {
    let source = form.as_map();
    let mut out = Map::new();

    for (name, value) in source {
        if is_metadata(name) {
            continue;
        }
        let Some(spec) = FieldSpec::lookup(name) else {
            tracing::debug!(field = %name, "Dropping unknown onboarding field");
            continue;
        };
        if spec.gate.is_some_and(|gate| !gate.is_open(source)) {
            out.insert(name.clone(), Value::Null);
            continue;
        }
        out.insert(name.clone(), coerce(spec, value)?);
    }

    Ok(out)
}

/// Convert form data into a typed backend profile.
pub fn to_backend_format(form: &FormData) -> Result<IntakeProfile, CoreError> {
    let value = to_backend_value(form)?;
    Ok(serde_json::from_value(Value::Object(value))?)
}

fn coerce(spec: &FieldSpec, value: &Value) -> Result<Value, CoreError> {
    if let Value::String(s) = value {
        if s.is_empty() {
            return Ok(Value::Null);
        }
    }

    match (spec.kind, value) {
        (_, Value::Null) => Ok(Value::Null),

        (FieldKind::List, Value::String(s)) => Ok(list_value(split_list(s))),
        (FieldKind::List, Value::Array(items)) => Ok(list_value(
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .filter(|item| !item.is_empty())
                .collect(),
        )),

        (FieldKind::ScoreMap, Value::String(s)) => Ok(parse_language_scores(s)
            .map(scores_value)
            .unwrap_or(Value::Null)),
        (FieldKind::ScoreMap, Value::Object(obj)) => Ok(scores_from_object(obj)
            .map(scores_value)
            .unwrap_or(Value::Null)),

        (FieldKind::Integer, _) => coerce_number(spec.name, value, true),
        (FieldKind::Decimal, _) => coerce_number(spec.name, value, false),

        (FieldKind::Flag, Value::String(s)) => match flag_value(value) {
            Some(flag) => Ok(Value::Bool(flag)),
            None => Err(CoreError::Validation(format!(
                "Field '{}' expects yes/no, got '{}'",
                spec.name,
                s.trim()
            ))),
        },

        _ => Ok(value.clone()),
    }
}

fn coerce_number(name: &str, value: &Value, integer: bool) -> Result<Value, CoreError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => return Ok(Value::Null),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    let number = parsed.filter(|n| n.is_finite()).ok_or_else(|| {
        CoreError::Validation(format!("Field '{name}' expects a number, got {value}"))
    })?;

    if integer {
        if number.fract() != 0.0 {
            return Err(CoreError::Validation(format!(
                "Field '{name}' expects a whole number, got {number}"
            )));
        }
        return Ok(Value::from(number as i64));
    }
    Ok(Value::from(number))
}

fn list_value(items: Vec<String>) -> Value {
    if items.is_empty() {
        Value::Null
    } else {
        Value::Array(items.into_iter().map(Value::String).collect())
    }
}

fn scores_value(scores: LanguageScores) -> Value {
    Value::Object(
        scores
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Backend -> form
// ---------------------------------------------------------------------------

/// Convert a backend profile into form data.
///
/// Returns `None` for `None` input; filling in defaults is the wizard's
/// job. Unanswered fields are left out of the result.
pub fn to_form_format(profile: Option<&IntakeProfile>) -> Option<FormData> {
    let profile = profile?;
    let Ok(Value::Object(backend)) = serde_json::to_value(profile) else {
        return None;
    };

    let mut form = FormData::new();
    for (name, value) in backend {
        let value = match (FieldSpec::lookup(&name).map(|s| s.kind), value) {
            (_, Value::Null) => continue,
            (Some(FieldKind::List), Value::Array(items)) => {
                let items: Vec<String> = items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                Value::String(join_list(&items))
            }
            (Some(FieldKind::ScoreMap), Value::Object(obj)) => {
                match scores_from_object(&obj).and_then(|s| format_language_scores(&s)) {
                    Some(text) => Value::String(text),
                    None => continue,
                }
            }
            (_, other) => other,
        };
        form.set(name, value);
    }
    Some(form)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
