//! Required-field checks for wizard steps.

use indexmap::IndexMap;

use crate::fields::{FieldSpec, Gate};
use crate::form::FormData;

/// Field name → message, for the fields that failed validation.
pub type FieldErrors = IndexMap<String, String>;

/// A field that must be answered before a step can be left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredField {
    pub name: &'static str,
    pub message: &'static str,
    /// Overrides the catalog gate; fields outside the intake catalog
    /// (agent onboarding) declare theirs here.
    pub gate: Option<Gate>,
}

impl RequiredField {
    pub const fn new(name: &'static str, message: &'static str) -> Self {
        Self {
            name,
            message,
            gate: None,
        }
    }

    pub const fn gated(name: &'static str, message: &'static str, gate: Gate) -> Self {
        Self {
            name,
            message,
            gate: Some(gate),
        }
    }

    fn effective_gate(&self) -> Option<Gate> {
        self.gate
            .or_else(|| FieldSpec::lookup(self.name).and_then(|spec| spec.gate))
    }
}

/// Check every rule against the form and collect the failures.
///
/// A rule whose gate is closed is skipped entirely, whatever value the
/// field itself holds.
pub fn check_required(form: &FormData, rules: &[RequiredField]) -> FieldErrors {
    rules
        .iter()
        .filter(|rule| {
            rule.effective_gate()
                .map_or(true, |gate| gate.is_open(form.as_map()))
        })
        .filter(|rule| form.is_blank(rule.name))
        .map(|rule| (rule.name.to_string(), rule.message.to_string()))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
