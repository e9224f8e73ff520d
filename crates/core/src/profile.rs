//! Backend-shape intake profile.
//!
//! The backend stores the profile as one flat JSON object. Here it is
//! split into per-screen groups that are `#[serde(flatten)]`ed back into
//! that flat shape, and the two flag-gated clusters with real structure
//! (marital status and a hard deadline) are tagged enums instead of
//! loose nullable columns.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};

/// Ordered language test name → score.
pub type LanguageScores = IndexMap<String, String>;

// ---------------------------------------------------------------------------
// Marital status
// ---------------------------------------------------------------------------

/// Marital status, carrying spouse details only when married.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "MaritalFields", into = "MaritalFields")]
pub enum MaritalStatus {
    #[default]
    Unanswered,
    Single,
    Married {
        spouse_nationality: Option<String>,
        spouse_profession: Option<String>,
    },
    Divorced,
    Widowed,
    /// A value outside the known set, kept verbatim.
    Other(String),
}

impl MaritalStatus {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Unanswered => None,
            Self::Single => Some("single"),
            Self::Married { .. } => Some("married"),
            Self::Divorced => Some("divorced"),
            Self::Widowed => Some("widowed"),
            Self::Other(s) => Some(s),
        }
    }
}

/// Flat wire form of [`MaritalStatus`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct MaritalFields {
    #[serde(default)]
    marital_status: Option<String>,
    #[serde(default)]
    spouse_nationality: Option<String>,
    #[serde(default)]
    spouse_profession: Option<String>,
}

impl From<MaritalFields> for MaritalStatus {
    fn from(raw: MaritalFields) -> Self {
        match raw.marital_status.as_deref() {
            None | Some("") => Self::Unanswered,
            Some("single") => Self::Single,
            Some("married") => Self::Married {
                spouse_nationality: raw.spouse_nationality,
                spouse_profession: raw.spouse_profession,
            },
            Some("divorced") => Self::Divorced,
            Some("widowed") => Self::Widowed,
            Some(other) => Self::Other(other.to_string()),
        }
    }
}

impl From<MaritalStatus> for MaritalFields {
    fn from(status: MaritalStatus) -> Self {
        let marital_status = status.as_str().map(str::to_string);
        match status {
            MaritalStatus::Married {
                spouse_nationality,
                spouse_profession,
            } => Self {
                marital_status,
                spouse_nationality,
                spouse_profession,
            },
            _ => Self {
                marital_status,
                ..Self::default()
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Deadline
// ---------------------------------------------------------------------------

/// Whether the move has a hard deadline, with its reason when it does.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "DeadlineFields", into = "DeadlineFields")]
pub enum Deadline {
    #[default]
    Unanswered,
    Flexible,
    Hard { reason: Option<String> },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DeadlineFields {
    #[serde(default)]
    deadline_hard: Option<bool>,
    #[serde(default)]
    deadline_reason: Option<String>,
}

impl From<DeadlineFields> for Deadline {
    fn from(raw: DeadlineFields) -> Self {
        match raw.deadline_hard {
            None => Self::Unanswered,
            Some(false) => Self::Flexible,
            Some(true) => Self::Hard {
                reason: raw.deadline_reason,
            },
        }
    }
}

impl From<Deadline> for DeadlineFields {
    fn from(deadline: Deadline) -> Self {
        match deadline {
            Deadline::Unanswered => Self::default(),
            Deadline::Flexible => Self {
                deadline_hard: Some(false),
                deadline_reason: None,
            },
            Deadline::Hard { reason } => Self {
                deadline_hard: Some(true),
                deadline_reason: reason,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Field groups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalDetails {
    pub nationality: Option<String>,
    pub citizenship_country: Option<String>,
    pub current_residence_country: Option<String>,
    pub applying_from_country: Option<String>,
    pub age: Option<i32>,
    #[serde(flatten)]
    pub marital_status: MaritalStatus,
    pub dependents: Option<i32>,
    pub contact_methods: Option<Vec<String>>,
    pub wants_lawyer_consultation: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DestinationPlan {
    /// Comma-joined country codes chosen in a multi-select.
    pub preferred_destinations: Option<String>,
    pub migration_timeline: Option<String>,
    pub commitment_level: Option<String>,
    pub target_timeline: Option<String>,
    pub target_move_date: Option<String>,
    #[serde(flatten)]
    pub deadline: Deadline,
    pub willing_to_consider_alternatives: Option<bool>,
    pub alternative_countries: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Education {
    pub education_level: Option<String>,
    pub field_of_study: Option<String>,
    pub degrees: Option<Vec<String>>,
    pub has_academic_transcripts: Option<bool>,
    pub has_admission_offer: Option<bool>,
    pub admission_details: Option<String>,
    pub professional_certifications: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkHistory {
    pub current_job_title: Option<String>,
    pub current_employer: Option<String>,
    pub industry: Option<String>,
    pub total_experience_years: Option<f64>,
    pub experience_years_in_position: Option<f64>,
    pub is_self_employed: Option<bool>,
    pub is_business_owner: Option<bool>,
    /// Years spent managing a business; only asked of business owners.
    pub business_management_experience: Option<f64>,
    pub employer_willing_to_sponsor: Option<bool>,
    pub has_job_offer_international: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillsAndLanguages {
    pub skills: Option<Vec<String>>,
    pub languages_known: Option<Vec<String>>,
    pub language_tests_taken: Option<Vec<String>>,
    pub language_scores: Option<LanguageScores>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImmigrationHistory {
    pub has_prior_visa_applications: Option<bool>,
    pub prior_visas: Option<Vec<String>>,
    pub has_active_visas: Option<bool>,
    pub current_visa_status: Option<String>,
    pub current_visa_country: Option<String>,
    pub current_visa_expiry: Option<String>,
    pub has_overstays: Option<bool>,
    pub overstay_details: Option<String>,
    pub criminal_records: Option<bool>,
    pub has_relatives_in_destination: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Finances {
    pub max_budget_usd: Option<f64>,
    pub budget_currency: Option<String>,
    pub budget_amount: Option<f64>,
    pub proof_of_funds_source: Option<String>,
    pub liquid_assets_usd: Option<f64>,
    pub has_property: Option<bool>,
    pub total_assets_usd: Option<f64>,
    pub annual_income_usd: Option<f64>,
    pub salary_usd: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecialCircumstances {
    pub has_special_needs: Option<bool>,
    pub has_medical_conditions: Option<bool>,
    pub has_invitation: Option<bool>,
    pub sponsor_in_destination: Option<bool>,
    pub international_achievements: Option<Vec<String>>,
    pub publications_count: Option<i32>,
    pub patents_count: Option<i32>,
    pub awards: Option<Vec<String>>,
    pub media_features: Option<Vec<String>>,
    pub professional_memberships: Option<Vec<String>>,
    pub recommendation_letters_count: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentReadiness {
    pub passport_expiry: Option<String>,
    pub has_birth_certificate: Option<bool>,
    pub has_financial_statements: Option<bool>,
    pub has_police_clearance: Option<bool>,
    pub has_medical_exam: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub risk_tolerance: Option<String>,
    pub prefers_diy_or_guided: Option<String>,
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// The complete intake profile in backend shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntakeProfile {
    #[serde(flatten)]
    pub personal: PersonalDetails,
    #[serde(flatten)]
    pub destination: DestinationPlan,
    #[serde(flatten)]
    pub education: Education,
    #[serde(flatten)]
    pub work: WorkHistory,
    #[serde(flatten)]
    pub skills: SkillsAndLanguages,
    #[serde(flatten)]
    pub immigration: ImmigrationHistory,
    #[serde(flatten)]
    pub finances: Finances,
    #[serde(flatten)]
    pub special: SpecialCircumstances,
    #[serde(flatten)]
    pub documents: DocumentReadiness,
    #[serde(flatten)]
    pub preferences: Preferences,
}

/// A saved profile as returned by `GET /profile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: DbId,
    pub user_id: DbId,
    #[serde(default)]
    pub onboarding_data: Option<IntakeProfile>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_json_maps_into_groups() {
        let profile: IntakeProfile = serde_json::from_value(json!({
            "nationality": "NG",
            "marital_status": "married",
            "spouse_profession": "Nurse",
            "education_level": "masters",
            "skills": ["Rust", "SQL"],
            "deadline_hard": true,
            "deadline_reason": "Job start",
            "language_scores": { "IELTS": "7.5" },
        }))
        .unwrap();

        assert_eq!(profile.personal.nationality.as_deref(), Some("NG"));
        assert_eq!(
            profile.personal.marital_status,
            MaritalStatus::Married {
                spouse_nationality: None,
                spouse_profession: Some("Nurse".into()),
            }
        );
        assert_eq!(
            profile.destination.deadline,
            Deadline::Hard {
                reason: Some("Job start".into())
            }
        );
        assert_eq!(
            profile.skills.skills,
            Some(vec!["Rust".to_string(), "SQL".to_string()])
        );
    }

    #[test]
    fn spouse_fields_dropped_when_not_married() {
        let profile: IntakeProfile = serde_json::from_value(json!({
            "marital_status": "single",
            "spouse_profession": "Nurse",
        }))
        .unwrap();
        assert_eq!(profile.personal.marital_status, MaritalStatus::Single);

        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["marital_status"], "single");
        assert!(value["spouse_profession"].is_null());
    }

    #[test]
    fn flexible_deadline_drops_reason() {
        let profile: IntakeProfile = serde_json::from_value(json!({
            "deadline_hard": false,
            "deadline_reason": "ignored",
        }))
        .unwrap();
        assert_eq!(profile.destination.deadline, Deadline::Flexible);
        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["deadline_hard"], false);
        assert!(value["deadline_reason"].is_null());
    }

    #[test]
    fn unknown_marital_value_is_preserved() {
        let profile: IntakeProfile =
            serde_json::from_value(json!({ "marital_status": "separated" })).unwrap();
        assert_eq!(
            profile.personal.marital_status,
            MaritalStatus::Other("separated".into())
        );
    }

    #[test]
    fn serializes_back_to_flat_object() {
        let value = serde_json::to_value(IntakeProfile::default()).unwrap();
        let obj = value.as_object().unwrap();
        assert!(obj.contains_key("nationality"));
        assert!(obj.contains_key("marital_status"));
        assert!(obj.contains_key("deadline_hard"));
        assert!(obj.contains_key("prefers_diy_or_guided"));
        assert!(!obj.contains_key("personal"));
    }
}
