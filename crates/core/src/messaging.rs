//! Conversations between applicants and travel agents.
//!
//! Timestamps are kept as the raw strings the backend sends; display code
//! formats them with [`crate::format::format_message_time`], which copes
//! with missing or malformed values.

use serde::{Deserialize, Serialize};

use crate::auth::{Role, User};
use crate::types::DbId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: DbId,
    pub user_id: DbId,
    pub agent_id: DbId,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub agent_name: Option<String>,
    #[serde(default)]
    pub agent_business_name: Option<String>,
    #[serde(default)]
    pub agent_owner_name: Option<String>,
    #[serde(default)]
    pub last_message_preview: Option<String>,
    #[serde(default)]
    pub last_message_at: Option<String>,
    #[serde(default)]
    pub unread_count: u32,
}

impl Conversation {
    /// Name of the other participant as seen by `viewer`.
    pub fn other_party_name(&self, viewer: Role) -> &str {
        match viewer {
            Role::User => self
                .agent_name
                .as_deref()
                .or(self.agent_business_name.as_deref())
                .unwrap_or("Travel Agent"),
            Role::TravelAgent => self.user_name.as_deref().unwrap_or("User"),
        }
    }

    /// Owner name shown under a business name, for applicants only.
    pub fn other_party_subtitle(&self, viewer: Role) -> Option<&str> {
        match (viewer, &self.agent_business_name) {
            (Role::User, Some(_)) => self.agent_owner_name.as_deref(),
            _ => None,
        }
    }

    pub fn preview(&self) -> &str {
        self.last_message_preview
            .as_deref()
            .unwrap_or("No messages yet")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: DbId,
    pub conversation_id: DbId,
    pub sender_id: DbId,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub is_read: bool,
}

impl Message {
    pub fn is_from(&self, user: &User) -> bool {
        self.sender_id == user.id
    }
}

/// Body of `POST /messaging/conversations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewConversation {
    pub agent_id: DbId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_message: Option<String>,
}

/// Body of `POST /messaging/conversations/{id}/messages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetRange {
    #[serde(default)]
    pub max_budget_usd: Option<f64>,
    #[serde(default)]
    pub budget_amount: Option<f64>,
    #[serde(default)]
    pub budget_currency: Option<String>,
}

impl BudgetRange {
    pub fn display(&self) -> Option<String> {
        if let Some(max) = self.max_budget_usd {
            return Some(format!("${max}"));
        }
        self.budget_amount.map(|amount| {
            let currency = self.budget_currency.as_deref().unwrap_or("USD");
            format!("{currency} {amount}")
        })
    }
}

/// What an agent sees about the applicant on the other side of a
/// conversation (`GET /messaging/users/{id}/profile-summary`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub country_of_origin: Option<String>,
    #[serde(default)]
    pub desired_destination_country: Option<String>,
    #[serde(default)]
    pub migration_purpose: Option<String>,
    #[serde(default)]
    pub timeline: Option<String>,
    #[serde(default)]
    pub budget_range: Option<BudgetRange>,
    #[serde(default)]
    pub has_recommendations: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn conversation() -> Conversation {
        serde_json::from_value(json!({
            "id": 9,
            "user_id": 1,
            "agent_id": 2,
            "user_name": "Kofi",
            "agent_business_name": "Wings Travel",
            "agent_owner_name": "Efua",
        }))
        .unwrap()
    }

    #[test]
    fn names_depend_on_viewer() {
        let conv = conversation();
        assert_eq!(conv.other_party_name(Role::User), "Wings Travel");
        assert_eq!(conv.other_party_subtitle(Role::User), Some("Efua"));
        assert_eq!(conv.other_party_name(Role::TravelAgent), "Kofi");
        assert_eq!(conv.other_party_subtitle(Role::TravelAgent), None);
        assert_eq!(conv.preview(), "No messages yet");
    }

    #[test]
    fn budget_prefers_usd_maximum() {
        let range = BudgetRange {
            max_budget_usd: None,
            budget_amount: Some(5000.0),
            budget_currency: None,
        };
        assert_eq!(range.display().as_deref(), Some("USD 5000"));
    }
}
