//! Account and authentication payloads.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Account role. Decides which onboarding wizard a new account lands in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    User,
    TravelAgent,
}

/// The signed-in account as returned by `GET /auth/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: DbId,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

fn default_active() -> bool {
    true
}

impl User {
    pub fn is_agent(&self) -> bool {
        self.role == Role::TravelAgent
    }
}

/// Body of `POST /auth/register`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Please fill in all required fields"))]
    pub name: String,
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

impl RegisterRequest {
    /// Run field checks locally, before anything is sent.
    pub fn check(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() || self.email.is_empty() || self.password.is_empty() {
            return Err(CoreError::Validation(
                "Please fill in all required fields".into(),
            ));
        }
        self.validate().map_err(|errors| {
            let fields = errors.field_errors();
            let message = ["name", "email", "password"]
                .iter()
                .filter_map(|field| fields.get(*field))
                .flat_map(|errs| errs.iter())
                .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                .unwrap_or_else(|| errors.to_string());
            CoreError::Validation(message)
        })
    }
}

/// Email and password for `POST /auth/login`. Sent form-encoded as
/// `username` and `password`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

impl LoginCredentials {
    pub fn form_fields(&self) -> [(&'static str, &str); 2] {
        [("username", &self.email), ("password", &self.password)]
    }
}

/// Token issued by the login, register, and Google endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Partial update for `PUT /auth/me`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}
