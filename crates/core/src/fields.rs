//! Intake field catalog.
//!
//! Every field the onboarding wizard can write is listed here together
//! with its value kind, its conceptual group, and (for conditional
//! fields) the gate that must hold before the field is meaningful. The
//! transform and the validator both consult this table; nothing else in
//! the crate hard-codes field names.

use serde_json::Value;

// ---------------------------------------------------------------------------
// Field kinds and groups
// ---------------------------------------------------------------------------

/// How a field's value is represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text or a select value.
    Text,
    /// Whole number (age, dependents, counts).
    Integer,
    /// Decimal number (years of experience, money amounts).
    Decimal,
    /// Yes/no answer.
    Flag,
    /// Date kept as an ISO `YYYY-MM-DD` string.
    Date,
    /// Comma-joined string in form shape, array of strings in backend shape.
    List,
    /// `"key: value"` pairs in form shape, string map in backend shape.
    ScoreMap,
}

/// Conceptual grouping of intake fields. Mirrors the wizard screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldGroup {
    Identity,
    Destination,
    Education,
    Work,
    Language,
    Immigration,
    Finances,
    Special,
    Documents,
    Preferences,
}

/// Precondition of a conditional field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// The named flag field must read as yes (see [`flag_value`]).
    Flag(&'static str),
    /// The named field must equal the given string.
    Equals(&'static str, &'static str),
}

impl Gate {
    /// Evaluate the gate against a JSON object. Missing and `null`
    /// governing values count as falsy.
    pub fn is_open(&self, obj: &serde_json::Map<String, Value>) -> bool {
        match self {
            Gate::Flag(name) => obj.get(*name).and_then(flag_value) == Some(true),
            Gate::Equals(name, expected) => {
                obj.get(*name).and_then(Value::as_str) == Some(*expected)
            }
        }
    }
}

/// Static description of one intake field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub group: FieldGroup,
    pub gate: Option<Gate>,
}

const fn field(name: &'static str, kind: FieldKind, group: FieldGroup) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        group,
        gate: None,
    }
}

const fn gated(name: &'static str, kind: FieldKind, group: FieldGroup, gate: Gate) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        group,
        gate: Some(gate),
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Server-assigned keys that are never client-writable.
pub const METADATA_FIELDS: &[&str] = &["id", "user_id", "created_at", "updated_at"];

/// The language test scores field.
pub const LANGUAGE_SCORES: &str = "language_scores";

/// Marital status value that opens the spouse fields.
pub const MARRIED: &str = "married";

use FieldGroup::*;
use FieldKind::*;

/// Every intake field, in wizard order.
pub const INTAKE_FIELDS: &[FieldSpec] = &[
    // Identity
    field("nationality", Text, Identity),
    field("citizenship_country", Text, Identity),
    field("current_residence_country", Text, Identity),
    field("applying_from_country", Text, Identity),
    field("age", Integer, Identity),
    field("marital_status", Text, Identity),
    gated("spouse_nationality", Text, Identity, Gate::Equals("marital_status", MARRIED)),
    gated("spouse_profession", Text, Identity, Gate::Equals("marital_status", MARRIED)),
    field("dependents", Integer, Identity),
    field("contact_methods", List, Identity),
    field("wants_lawyer_consultation", Flag, Identity),
    // Destination & timeline
    field("preferred_destinations", Text, Destination),
    field("migration_timeline", Text, Destination),
    field("commitment_level", Text, Destination),
    field("target_timeline", Text, Destination),
    field("target_move_date", Date, Destination),
    field("deadline_hard", Flag, Destination),
    gated("deadline_reason", Text, Destination, Gate::Flag("deadline_hard")),
    field("willing_to_consider_alternatives", Flag, Destination),
    gated(
        "alternative_countries",
        List,
        Destination,
        Gate::Flag("willing_to_consider_alternatives"),
    ),
    // Education
    field("education_level", Text, Education),
    field("field_of_study", Text, Education),
    field("degrees", List, Education),
    field("has_academic_transcripts", Flag, Education),
    field("has_admission_offer", Flag, Education),
    gated("admission_details", Text, Education, Gate::Flag("has_admission_offer")),
    field("professional_certifications", List, Education),
    // Work
    field("current_job_title", Text, Work),
    field("current_employer", Text, Work),
    field("industry", Text, Work),
    field("total_experience_years", Decimal, Work),
    field("experience_years_in_position", Decimal, Work),
    field("is_self_employed", Flag, Work),
    field("is_business_owner", Flag, Work),
    gated(
        "business_management_experience",
        Decimal,
        Work,
        Gate::Flag("is_business_owner"),
    ),
    field("employer_willing_to_sponsor", Flag, Work),
    field("has_job_offer_international", Flag, Work),
    // Skills & language
    field("skills", List, Language),
    field("languages_known", List, Language),
    field("language_tests_taken", List, Language),
    field(LANGUAGE_SCORES, ScoreMap, Language),
    // Immigration history
    field("has_prior_visa_applications", Flag, Immigration),
    gated(
        "prior_visas",
        List,
        Immigration,
        Gate::Flag("has_prior_visa_applications"),
    ),
    field("has_active_visas", Flag, Immigration),
    gated("current_visa_status", Text, Immigration, Gate::Flag("has_active_visas")),
    gated("current_visa_country", Text, Immigration, Gate::Flag("has_active_visas")),
    gated("current_visa_expiry", Date, Immigration, Gate::Flag("has_active_visas")),
    field("has_overstays", Flag, Immigration),
    gated("overstay_details", Text, Immigration, Gate::Flag("has_overstays")),
    field("criminal_records", Flag, Immigration),
    field("has_relatives_in_destination", Flag, Immigration),
    // Finances
    field("max_budget_usd", Decimal, Finances),
    field("budget_currency", Text, Finances),
    field("budget_amount", Decimal, Finances),
    field("proof_of_funds_source", Text, Finances),
    field("liquid_assets_usd", Decimal, Finances),
    field("has_property", Flag, Finances),
    field("total_assets_usd", Decimal, Finances),
    field("annual_income_usd", Decimal, Finances),
    field("salary_usd", Decimal, Finances),
    // Special circumstances
    field("has_special_needs", Flag, Special),
    field("has_medical_conditions", Flag, Special),
    field("has_invitation", Flag, Special),
    field("sponsor_in_destination", Flag, Special),
    field("international_achievements", List, Special),
    field("publications_count", Integer, Special),
    field("patents_count", Integer, Special),
    field("awards", List, Special),
    field("media_features", List, Special),
    field("professional_memberships", List, Special),
    field("recommendation_letters_count", Integer, Special),
    // Documents
    field("passport_expiry", Date, Documents),
    field("has_birth_certificate", Flag, Documents),
    field("has_financial_statements", Flag, Documents),
    field("has_police_clearance", Flag, Documents),
    field("has_medical_exam", Flag, Documents),
    // Preferences
    field("risk_tolerance", Text, Preferences),
    field("prefers_diy_or_guided", Text, Preferences),
];

// ---------------------------------------------------------------------------
// Lookup helpers
// ---------------------------------------------------------------------------

impl FieldSpec {
    /// Find an intake field by name.
    pub fn lookup(name: &str) -> Option<&'static FieldSpec> {
        INTAKE_FIELDS.iter().find(|f| f.name == name)
    }
}

/// Names of every list-typed field.
pub fn list_fields() -> impl Iterator<Item = &'static str> {
    INTAKE_FIELDS
        .iter()
        .filter(|f| f.kind == FieldKind::List)
        .map(|f| f.name)
}

/// Whether `name` is server-assigned metadata.
pub fn is_metadata(name: &str) -> bool {
    METADATA_FIELDS.contains(&name)
}

/// Read a yes/no answer. Booleans pass through; the strings `true`/`yes`
/// and `false`/`no` (trimmed) map to their flag. Anything else is `None`.
pub fn flag_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
