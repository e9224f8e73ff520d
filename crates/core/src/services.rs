//! Collaborator contracts consumed by the wizards.
//!
//! The wizards never talk to the network directly; callers hand them an
//! implementation of these traits (the REST client in production, fakes
//! in tests).

use async_trait::async_trait;

use crate::agent::{AgentOnboardingData, AgentProfileRecord};
use crate::profile::{IntakeProfile, ProfileRecord};
use crate::recommendation::RecommendationResponse;

/// Failure reported by a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ServiceError {
    /// HTTP status when the failure came from the backend.
    pub status: Option<u16>,
    pub message: String,
}

impl ServiceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

/// Saves the applicant's intake profile.
#[async_trait]
pub trait ProfileService: Send + Sync {
    async fn update_profile(&self, profile: &IntakeProfile) -> Result<ProfileRecord, ServiceError>;
}

/// Produces visa recommendations for a saved profile.
#[async_trait]
pub trait RecommendationService: Send + Sync {
    async fn generate_recommendations(
        &self,
        profile: &IntakeProfile,
    ) -> Result<RecommendationResponse, ServiceError>;
}

/// Saves a travel agent's onboarding answers.
#[async_trait]
pub trait AgentProfileService: Send + Sync {
    async fn update_agent_profile(
        &self,
        data: &AgentOnboardingData,
    ) -> Result<AgentProfileRecord, ServiceError>;
}
