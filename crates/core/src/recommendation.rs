//! Visa recommendation and checklist payloads.
//!
//! Recommendations are generated by the backend; this module only types
//! the responses and tracks local checklist progress.

use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};

/// One visa pathway suggested for the applicant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationOption {
    pub visa_type: String,
    pub reasoning: String,
    #[serde(default)]
    pub likelihood: Option<String>,
    #[serde(default)]
    pub estimated_timeline: Option<String>,
    #[serde(default)]
    pub estimated_costs: Option<String>,
    #[serde(default)]
    pub risk_flags: Option<Vec<String>>,
    #[serde(default)]
    pub next_steps: Option<Vec<String>>,
    #[serde(default)]
    pub checklist: Option<Vec<ChecklistItem>>,
}

impl RecommendationOption {
    /// Whether the option needs a detailed checklist generated for it.
    /// Missing checklists and single-step placeholders both qualify.
    pub fn needs_checklist(&self) -> bool {
        self.checklist.as_ref().map_or(true, |items| items.len() <= 1)
    }
}

/// Response of `POST /recommendations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub summary: String,
    pub options: Vec<RecommendationOption>,
    #[serde(default)]
    pub notes: Option<Vec<String>>,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub raw_message: Option<String>,
}

fn default_source() -> String {
    "openai".to_string()
}

/// A stored recommendation from `GET /recommendations/history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRecord {
    pub id: DbId,
    #[serde(flatten)]
    pub response: RecommendationResponse,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// Checklist
// ---------------------------------------------------------------------------

/// Who is responsible for a checklist step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOwner {
    #[serde(rename = "JAPA")]
    Japa,
    #[serde(rename = "APPLICANT", alias = "applicant")]
    Applicant,
}

/// One step of a visa application checklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "name")]
    pub title: Option<String>,
    #[serde(default, alias = "stepNumber")]
    pub step_number: Option<u32>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub owner: Option<StepOwner>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub guidance: Option<String>,
    #[serde(default)]
    pub documents: Vec<String>,
    #[serde(default, alias = "dueIn")]
    pub due_in: Option<String>,
}

impl ChecklistItem {
    /// Stable identifier, falling back to the position in the list.
    pub fn key(&self, index: usize) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| format!("step-{}", index + 1))
    }

    /// Display title, falling back to the position in the list.
    pub fn display_title(&self, index: usize) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| format!("Step {}", index + 1))
    }
}

/// Response of `POST /recommendations/checklist`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistResponse {
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
}

/// Flip the completion flag of the step with the given key. Returns
/// `false` when no step matches.
pub fn toggle_step(items: &mut [ChecklistItem], key: &str) -> bool {
    for (index, item) in items.iter_mut().enumerate() {
        if item.key(index) == key {
            item.completed = !item.completed;
            return true;
        }
    }
    false
}

/// Completed steps and total steps.
pub fn progress(items: &[ChecklistItem]) -> (usize, usize) {
    let done = items.iter().filter(|item| item.completed).count();
    (done, items.len())
}

/// Completion as a whole percentage, `0` for an empty checklist.
pub fn progress_percent(items: &[ChecklistItem]) -> u8 {
    let (done, total) = progress(items);
    if total == 0 {
        return 0;
    }
    ((done * 100) / total) as u8
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn checklist() -> Vec<ChecklistItem> {
        serde_json::from_value(json!([
            { "id": "passport", "title": "Renew passport", "owner": "APPLICANT" },
            { "name": "Submit forms", "stepNumber": 2, "owner": "JAPA", "dueIn": "2 weeks" },
            { "title": "Biometrics", "completed": true },
        ]))
        .unwrap()
    }

    #[test]
    fn checklist_accepts_camel_case_aliases() {
        let items = checklist();
        assert_eq!(items[1].title.as_deref(), Some("Submit forms"));
        assert_eq!(items[1].step_number, Some(2));
        assert_eq!(items[1].due_in.as_deref(), Some("2 weeks"));
        assert_eq!(items[1].owner, Some(StepOwner::Japa));
    }

    #[test]
    fn keys_fall_back_to_position() {
        let items = checklist();
        assert_eq!(items[0].key(0), "passport");
        assert_eq!(items[2].key(2), "step-3");
        assert_eq!(items[2].display_title(2), "Biometrics");
    }

    #[test]
    fn toggle_and_progress() {
        let mut items = checklist();
        assert_eq!(progress(&items), (1, 3));
        assert!(toggle_step(&mut items, "passport"));
        assert!(toggle_step(&mut items, "step-2"));
        assert_eq!(progress(&items), (3, 3));
        assert_eq!(progress_percent(&items), 100);
        assert!(!toggle_step(&mut items, "missing"));
        assert_eq!(progress_percent(&[]), 0);
    }

    #[test]
    fn single_step_checklist_needs_generation() {
        let option: RecommendationOption = serde_json::from_value(json!({
            "visa_type": "Skilled Worker",
            "reasoning": "Job offer",
            "checklist": [{ "title": "Apply" }],
        }))
        .unwrap();
        assert!(option.needs_checklist());
    }

    #[test]
    fn response_defaults_source() {
        let response: RecommendationResponse =
            serde_json::from_value(json!({ "summary": "ok", "options": [] })).unwrap();
        assert_eq!(response.source, "openai");
    }
}
