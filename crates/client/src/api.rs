//! REST client for the Japa backend.
//!
//! Wraps every backend endpoint the front end uses with [`reqwest`].
//! A bearer token is attached once one has been set. Each client carries
//! a [`CancellationToken`]; [`ApiClient::scoped`] hands a view its own
//! child client so tearing the view down aborts only its requests.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use japa_core::agent::{AgentFilters, AgentOnboardingData, AgentProfileRecord, TravelAgent};
use japa_core::auth::{LoginCredentials, RegisterRequest, TokenResponse, User, UserUpdate};
use japa_core::documents::{DocumentRecord, DocumentUpdate, NewDocument, StatusFilter};
use japa_core::messaging::{Conversation, Message, NewConversation, NewMessage, ProfileSummary};
use japa_core::profile::{IntakeProfile, ProfileRecord};
use japa_core::recommendation::{
    ChecklistItem, ChecklistResponse, RecommendationOption, RecommendationRecord,
    RecommendationResponse,
};
use japa_core::services::{
    AgentProfileService, ProfileService, RecommendationService, ServiceError,
};
use japa_core::types::DbId;

use crate::config::ClientConfig;

/// Fallback when the server gives no usable error text.
const GENERIC_ERROR: &str = "An error occurred";

/// Errors from the backend REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// A success response whose body did not match the expected shape.
    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The request was aborted because its view was torn down.
    #[error("Request cancelled")]
    Cancelled,
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

impl From<ApiError> for ServiceError {
    fn from(err: ApiError) -> Self {
        ServiceError {
            status: err.status(),
            message: err.to_string(),
        }
    }
}

/// Extract the user-facing message from an error body.
///
/// `detail` may be a string or a list of `{msg}` validation entries; when
/// neither is present the HTTP status text is used.
pub fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| json.get("detail").cloned());
    match detail {
        Some(Value::String(detail)) if !detail.is_empty() => detail,
        Some(Value::Array(entries)) => {
            let messages: Vec<&str> = entries
                .iter()
                .filter_map(|entry| entry.get("msg").and_then(Value::as_str))
                .collect();
            if messages.is_empty() {
                GENERIC_ERROR.to_string()
            } else {
                messages.join(", ")
            }
        }
        Some(_) => GENERIC_ERROR.to_string(),
        None => status
            .canonical_reason()
            .unwrap_or(GENERIC_ERROR)
            .to_string(),
    }
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct OnboardingBody<'a> {
    onboarding_data: &'a IntakeProfile,
}

#[derive(Debug, Serialize)]
struct RecommendationRequest<'a> {
    use_cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    intake: Option<&'a IntakeProfile>,
}

#[derive(Debug, Serialize)]
struct ChecklistRequest<'a> {
    option: &'a RecommendationOption,
}

#[derive(Debug, Serialize)]
struct GoogleSignIn<'a> {
    id_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<japa_core::auth::Role>,
}

/// One turn of the assistant conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    conversation_history: &'a [ChatTurn],
}

/// Response of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub conversation_history: Option<Vec<ChatTurn>>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for the backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    api_url: String,
    token: Arc<RwLock<Option<String>>>,
    cancel: CancellationToken,
}

impl ApiClient {
    /// Create a client with the configured base URL and timeout.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(client, config.api_url.clone()))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: Arc::new(RwLock::new(None)),
            cancel: CancellationToken::new(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// A client sharing this one's connection pool and token, whose
    /// requests are aborted by either its own or its parent's `cancel`.
    pub fn scoped(&self) -> Self {
        Self {
            client: self.client.clone(),
            api_url: self.api_url.clone(),
            token: Arc::clone(&self.token),
            cancel: self.cancel.child_token(),
        }
    }

    /// Abort in-flight and future requests made through this client
    /// and any client scoped from it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Replace the bearer token shared by this client and its scopes.
    pub fn set_token(&self, token: Option<String>) {
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|guard| guard.clone())
    }

    // ---- auth ----

    /// `POST /auth/register`.
    pub async fn register(&self, request: &RegisterRequest) -> Result<TokenResponse, ApiError> {
        self.execute(self.client.post(self.url("/auth/register")).json(request))
            .await
    }

    /// `POST /auth/login`, form-encoded.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<TokenResponse, ApiError> {
        self.execute(
            self.client
                .post(self.url("/auth/login"))
                .form(&credentials.form_fields()),
        )
        .await
    }

    /// `POST /auth/google` with an identity provider token.
    pub async fn login_with_google(
        &self,
        id_token: &str,
        role: Option<japa_core::auth::Role>,
    ) -> Result<TokenResponse, ApiError> {
        let body = GoogleSignIn { id_token, role };
        self.execute(self.client.post(self.url("/auth/google")).json(&body))
            .await
    }

    /// `GET /auth/me`.
    pub async fn current_user(&self) -> Result<User, ApiError> {
        self.execute(self.client.get(self.url("/auth/me"))).await
    }

    /// `PUT /auth/me`.
    pub async fn update_current_user(&self, update: &UserUpdate) -> Result<User, ApiError> {
        self.execute(self.client.put(self.url("/auth/me")).json(update))
            .await
    }

    // ---- profile ----

    /// `GET /profile`.
    pub async fn get_profile(&self) -> Result<ProfileRecord, ApiError> {
        self.execute(self.client.get(self.url("/profile"))).await
    }

    /// `POST /profile`.
    pub async fn create_profile(&self, profile: &IntakeProfile) -> Result<ProfileRecord, ApiError> {
        let body = OnboardingBody {
            onboarding_data: profile,
        };
        self.execute(self.client.post(self.url("/profile")).json(&body))
            .await
    }

    /// `PUT /profile`.
    pub async fn put_profile(&self, profile: &IntakeProfile) -> Result<ProfileRecord, ApiError> {
        let body = OnboardingBody {
            onboarding_data: profile,
        };
        self.execute(self.client.put(self.url("/profile")).json(&body))
            .await
    }

    // ---- recommendations ----

    /// `POST /recommendations`. Without `intake` the backend uses the
    /// saved profile.
    pub async fn get_recommendations(
        &self,
        use_cached: bool,
        intake: Option<&IntakeProfile>,
    ) -> Result<RecommendationResponse, ApiError> {
        let body = RecommendationRequest { use_cached, intake };
        self.execute(self.client.post(self.url("/recommendations")).json(&body))
            .await
    }

    /// `GET /recommendations/history?limit=`.
    pub async fn recommendation_history(
        &self,
        limit: u32,
    ) -> Result<Vec<RecommendationRecord>, ApiError> {
        self.execute(
            self.client
                .get(self.url("/recommendations/history"))
                .query(&[("limit", limit)]),
        )
        .await
    }

    /// `GET /recommendations/{id}`.
    pub async fn get_recommendation(&self, id: DbId) -> Result<RecommendationRecord, ApiError> {
        self.execute(self.client.get(self.url(&format!("/recommendations/{id}"))))
            .await
    }

    /// `POST /recommendations/checklist`.
    pub async fn generate_checklist(
        &self,
        option: &RecommendationOption,
    ) -> Result<Vec<ChecklistItem>, ApiError> {
        let body = ChecklistRequest { option };
        let response: ChecklistResponse = self
            .execute(
                self.client
                    .post(self.url("/recommendations/checklist"))
                    .json(&body),
            )
            .await?;
        Ok(response.checklist)
    }

    // ---- documents ----

    /// `GET /documents`, optionally filtered by status.
    pub async fn list_documents(&self, filter: StatusFilter) -> Result<Vec<DocumentRecord>, ApiError> {
        let mut request = self.client.get(self.url("/documents"));
        if let Some(status) = filter.query_value() {
            request = request.query(&[("status_filter", status)]);
        }
        self.execute(request).await
    }

    /// `POST /documents`.
    pub async fn create_document(&self, document: &NewDocument) -> Result<DocumentRecord, ApiError> {
        self.execute(self.client.post(self.url("/documents")).json(document))
            .await
    }

    /// `GET /documents/{id}`.
    pub async fn get_document(&self, id: DbId) -> Result<DocumentRecord, ApiError> {
        self.execute(self.client.get(self.url(&format!("/documents/{id}"))))
            .await
    }

    /// `PUT /documents/{id}`.
    pub async fn update_document(
        &self,
        id: DbId,
        update: &DocumentUpdate,
    ) -> Result<DocumentRecord, ApiError> {
        self.execute(
            self.client
                .put(self.url(&format!("/documents/{id}")))
                .json(update),
        )
        .await
    }

    /// `DELETE /documents/{id}`.
    pub async fn delete_document(&self, id: DbId) -> Result<(), ApiError> {
        self.execute_empty(self.client.delete(self.url(&format!("/documents/{id}"))))
            .await
    }

    // ---- travel agents ----

    /// `GET /travel-agents` with non-empty filters.
    pub async fn list_agents(&self, filters: &AgentFilters) -> Result<Vec<TravelAgent>, ApiError> {
        self.execute(
            self.client
                .get(self.url("/travel-agents"))
                .query(&filters.query_pairs()),
        )
        .await
    }

    /// `GET /travel-agent/profile`.
    pub async fn get_agent_profile(&self) -> Result<AgentProfileRecord, ApiError> {
        self.execute(self.client.get(self.url("/travel-agent/profile")))
            .await
    }

    /// `PUT /travel-agent/profile`.
    pub async fn put_agent_profile(
        &self,
        data: &AgentOnboardingData,
    ) -> Result<AgentProfileRecord, ApiError> {
        self.execute(
            self.client
                .put(self.url("/travel-agent/profile"))
                .json(data),
        )
        .await
    }

    /// `GET /travel-agent/onboarding-schema`.
    pub async fn agent_onboarding_schema(&self) -> Result<Value, ApiError> {
        self.execute(self.client.get(self.url("/travel-agent/onboarding-schema")))
            .await
    }

    // ---- messaging ----

    /// `GET /messaging/conversations`.
    pub async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        self.execute(self.client.get(self.url("/messaging/conversations")))
            .await
    }

    /// `POST /messaging/conversations`.
    pub async fn start_conversation(
        &self,
        request: &NewConversation,
    ) -> Result<Conversation, ApiError> {
        self.execute(
            self.client
                .post(self.url("/messaging/conversations"))
                .json(request),
        )
        .await
    }

    /// `GET /messaging/conversations/{id}`.
    pub async fn get_conversation(&self, id: DbId) -> Result<Conversation, ApiError> {
        self.execute(
            self.client
                .get(self.url(&format!("/messaging/conversations/{id}"))),
        )
        .await
    }

    /// `GET /messaging/conversations/{id}/messages`.
    pub async fn list_messages(&self, conversation_id: DbId) -> Result<Vec<Message>, ApiError> {
        self.execute(self.client.get(self.url(&format!(
            "/messaging/conversations/{conversation_id}/messages"
        ))))
        .await
    }

    /// `POST /messaging/conversations/{id}/messages`.
    pub async fn send_message(
        &self,
        conversation_id: DbId,
        content: &str,
    ) -> Result<Message, ApiError> {
        let body = NewMessage {
            content: content.to_string(),
        };
        self.execute(
            self.client
                .post(self.url(&format!(
                    "/messaging/conversations/{conversation_id}/messages"
                )))
                .json(&body),
        )
        .await
    }

    /// `GET /messaging/users/{id}/profile-summary`.
    pub async fn profile_summary(&self, user_id: DbId) -> Result<ProfileSummary, ApiError> {
        self.execute(self.client.get(self.url(&format!(
            "/messaging/users/{user_id}/profile-summary"
        ))))
        .await
    }

    // ---- assistant ----

    /// `POST /chat`.
    pub async fn chat(&self, message: &str, history: &[ChatTurn]) -> Result<ChatResponse, ApiError> {
        let body = ChatRequest {
            message,
            conversation_history: history,
        };
        self.execute(self.client.post(self.url("/chat")).json(&body))
            .await
    }

    // ---- private helpers ----

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    /// Attach the bearer token and send, racing the cancellation token.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let request = match self.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ApiError::Cancelled),
            result = request.send() => {
                let response = result?;
                Self::ensure_success(response).await
            }
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        let bytes = tokio::select! {
            _ = self.cancel.cancelled() => return Err(ApiError::Cancelled),
            bytes = response.bytes() => bytes?,
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn execute_empty(&self, request: reqwest::RequestBuilder) -> Result<(), ApiError> {
        self.send(request).await?;
        Ok(())
    }

    /// Turn a non-2xx response into [`ApiError::Api`] carrying the
    /// server's `detail` message.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = error_message(status, &body);
        tracing::debug!(status = status.as_u16(), %message, "Backend returned an error");
        Err(ApiError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

// ---------------------------------------------------------------------------
// Collaborator implementations
// ---------------------------------------------------------------------------

#[async_trait]
impl ProfileService for ApiClient {
    async fn update_profile(&self, profile: &IntakeProfile) -> Result<ProfileRecord, ServiceError> {
        Ok(self.put_profile(profile).await?)
    }
}

#[async_trait]
impl RecommendationService for ApiClient {
    async fn generate_recommendations(
        &self,
        profile: &IntakeProfile,
    ) -> Result<RecommendationResponse, ServiceError> {
        Ok(self.get_recommendations(false, Some(profile)).await?)
    }
}

#[async_trait]
impl AgentProfileService for ApiClient {
    async fn update_agent_profile(
        &self,
        data: &AgentOnboardingData,
    ) -> Result<AgentProfileRecord, ServiceError> {
        Ok(self.put_agent_profile(data).await?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
