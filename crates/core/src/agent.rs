//! Travel agent profile and directory types.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use crate::error::CoreError;
use crate::form::FormData;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Specializations
// ---------------------------------------------------------------------------

/// Specialization codes offered to agents, with display labels.
pub const SPECIALIZATIONS: &[(&str, &str)] = &[
    ("visas", "Visas"),
    ("relocation", "Relocation"),
    ("student_migration", "Student Migration"),
    ("work_permits", "Work Permits"),
    ("family_reunification", "Family Reunification"),
    ("business_immigration", "Business Immigration"),
    ("investment_immigration", "Investment Immigration"),
    ("tourism_visas", "Tourism Visas"),
    ("permanent_residency", "Permanent Residency"),
    ("citizenship", "Citizenship"),
];

/// Display label for a specialization code, echoing unknown codes.
pub fn specialization_label(code: &str) -> &str {
    SPECIALIZATIONS
        .iter()
        .find(|(c, _)| *c == code)
        .map_or(code, |(_, label)| *label)
}

// ---------------------------------------------------------------------------
// Agent onboarding data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct ContactDetails {
    #[serde(default)]
    pub whatsapp: Option<String>,
    #[serde(default)]
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Agent onboarding payload sent to `PUT /travel-agent/profile`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct AgentOnboardingData {
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,
    #[serde(default)]
    pub business_name: Option<String>,
    #[validate(length(min = 1, message = "Country of operation is required"))]
    pub country_of_operation: String,
    #[validate(length(min = 1, message = "At least one city is required"))]
    pub cities_covered: Vec<String>,
    pub years_of_experience: Option<f64>,
    #[validate(length(min = 1, message = "At least one specialization is required"))]
    pub specializations: Vec<String>,
    #[validate(length(min = 1, message = "At least one destination country is required"))]
    pub supported_destination_countries: Vec<String>,
    #[validate(length(min = 1, message = "Preferred contact method is required"))]
    pub preferred_contact_method: String,
    #[serde(default)]
    #[validate(nested)]
    pub contact_details: ContactDetails,
    #[validate(length(min = 1, message = "At least one language is required"))]
    pub languages_spoken: Vec<String>,
    #[validate(length(min = 1, message = "Bio is required"))]
    pub bio: String,
    #[serde(default = "default_availability")]
    pub availability_status: String,
}

fn default_availability() -> String {
    "available".to_string()
}

impl AgentOnboardingData {
    /// Build the typed payload from agent wizard form data and validate it.
    pub fn from_form(form: &FormData) -> Result<Self, CoreError> {
        let mut map = form.as_map().clone();
        // Unanswered text fields arrive as null; the payload wants "".
        for key in ["full_name", "country_of_operation", "preferred_contact_method", "bio"] {
            if matches!(map.get(key), None | Some(Value::Null)) {
                map.insert(key.to_string(), Value::String(String::new()));
            }
        }
        if let Some(Value::Object(contact)) = map.get_mut("contact_details") {
            for value in contact.values_mut() {
                if value.as_str().is_some_and(|s| s.trim().is_empty()) {
                    *value = Value::Null;
                }
            }
        }
        let data: Self = serde_json::from_value(Value::Object(map))?;
        data.validate()
            .map_err(|e| CoreError::Validation(e.to_string()))?;
        Ok(data)
    }
}

/// Initial form state for the agent onboarding wizard.
pub fn agent_form_defaults() -> FormData {
    let defaults = json!({
        "full_name": null,
        "business_name": null,
        "country_of_operation": null,
        "cities_covered": [],
        "years_of_experience": null,
        "specializations": [],
        "supported_destination_countries": [],
        "preferred_contact_method": null,
        "contact_details": { "whatsapp": "", "email": "", "phone": "" },
        "languages_spoken": [],
        "bio": null,
        "availability_status": "available",
    });
    match defaults {
        Value::Object(map) => FormData::from(map),
        _ => FormData::new(),
    }
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

/// A travel agent as listed by `GET /travel-agents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelAgent {
    pub id: DbId,
    pub user_id: DbId,
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub country_of_operation: Option<String>,
    #[serde(default)]
    pub cities_covered: Vec<String>,
    #[serde(default)]
    pub years_of_experience: Option<f64>,
    #[serde(default)]
    pub specializations: Vec<String>,
    #[serde(default)]
    pub supported_destination_countries: Vec<String>,
    #[serde(default)]
    pub languages_spoken: Vec<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub availability_status: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub profile_photo_url: Option<String>,
}

impl TravelAgent {
    /// Name to show in listings: business name, then owner name.
    pub fn display_name(&self) -> &str {
        self.business_name
            .as_deref()
            .or(self.owner_name.as_deref())
            .unwrap_or("Travel Agent")
    }
}

/// The signed-in agent's own profile (`GET /travel-agent/profile`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfileRecord {
    pub id: DbId,
    pub user_id: DbId,
    #[serde(default)]
    pub onboarding_data: Option<Value>,
    #[serde(default)]
    pub is_verified: bool,
}

/// Directory filters; empty values are left off the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentFilters {
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub specialization: String,
}

impl AgentFilters {
    /// Non-empty filters as query pairs.
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        [
            ("country", self.country.as_str()),
            ("destination", self.destination.as_str()),
            ("specialization", self.specialization.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn complete_form() -> FormData {
        let mut form = agent_form_defaults();
        form.set("full_name", json!("Ada Obi"));
        form.set("country_of_operation", json!("NG"));
        form.set("cities_covered", json!(["Lagos"]));
        form.set("years_of_experience", json!(6));
        form.set("specializations", json!(["visas"]));
        form.set("supported_destination_countries", json!(["CA"]));
        form.set("preferred_contact_method", json!("email"));
        form.set("languages_spoken", json!(["English"]));
        form.set("bio", json!("Ten years placing nurses abroad."));
        form
    }

    #[test]
    fn labels_known_and_unknown_specializations() {
        assert_eq!(specialization_label("work_permits"), "Work Permits");
        assert_eq!(specialization_label("astronauts"), "astronauts");
    }

    #[test]
    fn complete_form_converts() {
        let data = AgentOnboardingData::from_form(&complete_form()).unwrap();
        assert_eq!(data.cities_covered, vec!["Lagos"]);
        assert_eq!(data.availability_status, "available");
    }

    #[test]
    fn missing_required_list_is_rejected() {
        let mut form = complete_form();
        form.set("languages_spoken", json!([]));
        assert_matches!(
            AgentOnboardingData::from_form(&form),
            Err(CoreError::Validation(msg)) if msg.contains("language")
        );
    }

    #[test]
    fn bad_contact_email_is_rejected() {
        let mut form = complete_form();
        form.set(
            "contact_details",
            json!({ "email": "not-an-email", "phone": "", "whatsapp": "" }),
        );
        assert!(AgentOnboardingData::from_form(&form).is_err());
    }

    #[test]
    fn filters_skip_empty_values() {
        let filters = AgentFilters {
            country: "NG".into(),
            destination: " ".into(),
            specialization: "visas".into(),
        };
        assert_eq!(
            filters.query_pairs(),
            vec![("country", "NG"), ("specialization", "visas")]
        );
    }
}
