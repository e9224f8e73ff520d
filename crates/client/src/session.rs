//! Authentication session context.
//!
//! [`SessionContext`] is created once at start-up with
//! [`SessionContext::init`] and passed to whatever needs the signed-in
//! user. It owns the current user, the bearer token, and the last synced
//! onboarding profile, and mirrors them into a [`SessionStore`] so a
//! restart picks up where the user left off. [`SessionContext::logout`]
//! tears all of it down.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use japa_core::auth::{LoginCredentials, RegisterRequest, Role, TokenResponse, User};
use japa_core::error::CoreError;
use japa_core::profile::{IntakeProfile, ProfileRecord};
use japa_core::services::{ProfileService, ServiceError};
use japa_core::snapshot::SnapshotStore;

use crate::api::{ApiClient, ApiError};
use crate::oauth::{self, OAuthCallback, OAuthError, PendingOAuth};
use crate::persist;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    OAuth(#[from] OAuthError),

    #[error(transparent)]
    Invalid(#[from] CoreError),

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Session storage failed: {0}")]
    Storage(String),
}

/// Everything that survives a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
    /// Last onboarding profile known to the backend, in backend shape.
    #[serde(default)]
    pub onboarding: Option<IntakeProfile>,
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<AuthSession>, SessionError>;
    fn save(&self, session: &AuthSession) -> Result<(), SessionError>;
    fn clear(&self) -> Result<(), SessionError>;
}

/// Session kept in `{data_dir}/session.json`.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join("session.json"),
        }
    }
}

fn storage(e: std::io::Error) -> SessionError {
    SessionError::Storage(e.to_string())
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<AuthSession>, SessionError> {
        persist::read_json(&self.path).map_err(storage)
    }

    fn save(&self, session: &AuthSession) -> Result<(), SessionError> {
        persist::write_json(&self.path, session).map_err(storage)
    }

    fn clear(&self) -> Result<(), SessionError> {
        persist::remove_file(&self.path).map_err(storage)
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<AuthSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> SessionError {
    SessionError::Storage("session store poisoned".into())
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<AuthSession>, SessionError> {
        Ok(self.session.lock().map_err(poisoned)?.clone())
    }

    fn save(&self, session: &AuthSession) -> Result<(), SessionError> {
        *self.session.lock().map_err(poisoned)? = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self.session.lock().map_err(poisoned)? = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Google sign-in settings.
#[derive(Debug, Clone, Default)]
pub struct GoogleSettings {
    pub client_id: Option<String>,
    pub redirect_uri: String,
}

/// Process-wide auth state, passed explicitly.
pub struct SessionContext {
    api: ApiClient,
    store: Arc<dyn SessionStore>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    google: GoogleSettings,
    session: RwLock<Option<AuthSession>>,
    loading: AtomicBool,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("api", &self.api)
            .field("user", &self.user())
            .finish_non_exhaustive()
    }
}

/// Clears the loading flag when an operation finishes, however it ends.
struct LoadingGuard<'a>(&'a AtomicBool);

impl<'a> LoadingGuard<'a> {
    fn start(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SessionContext {
    /// Build the context and restore any persisted session into it.
    pub fn init(api: ApiClient, store: Arc<dyn SessionStore>) -> Self {
        let restored = match store.load() {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to restore session");
                None
            }
        };
        if let Some(session) = &restored {
            tracing::debug!(user_id = session.user.id, "Restored session");
            api.set_token(Some(session.token.clone()));
        }
        Self {
            api,
            store,
            snapshots: None,
            google: GoogleSettings::default(),
            session: RwLock::new(restored),
            loading: AtomicBool::new(false),
        }
    }

    /// Also clear the user's onboarding snapshot on logout.
    pub fn with_snapshots(mut self, snapshots: Arc<dyn SnapshotStore>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    pub fn with_google(mut self, google: GoogleSettings) -> Self {
        self.google = google;
        self
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn session(&self) -> Option<AuthSession> {
        self.session.read().ok().and_then(|s| s.clone())
    }

    pub fn user(&self) -> Option<User> {
        self.session().map(|s| s.user)
    }

    pub fn token(&self) -> Option<String> {
        self.session().map(|s| s.token)
    }

    pub fn onboarding(&self) -> Option<IntakeProfile> {
        self.session().and_then(|s| s.onboarding)
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_some()
    }

    /// Whether a sign-in or profile operation is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Sign in with email and password.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, SessionError> {
        let _loading = LoadingGuard::start(&self.loading);
        let credentials = LoginCredentials {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let token = self.api.login(&credentials).await?;
        self.establish(token).await
    }

    /// Create an account and sign in to it.
    pub async fn register(&self, request: &RegisterRequest) -> Result<User, SessionError> {
        request.check()?;
        let _loading = LoadingGuard::start(&self.loading);
        let token = self.api.register(request).await?;
        self.establish(token).await
    }

    /// Start Google sign-in. Fails before anything else when no client id
    /// is configured.
    pub fn begin_google_sign_in(&self) -> Result<PendingOAuth, SessionError> {
        let pending = oauth::begin(
            self.google.client_id.as_deref(),
            &self.google.redirect_uri,
        )?;
        tracing::debug!("Started Google sign-in");
        Ok(pending)
    }

    /// Finish Google sign-in with the provider's callback.
    pub async fn complete_google_sign_in(
        &self,
        pending: &PendingOAuth,
        callback: OAuthCallback,
        role: Option<Role>,
    ) -> Result<User, SessionError> {
        let id_token = pending.complete(callback, chrono::Utc::now())?;
        let _loading = LoadingGuard::start(&self.loading);
        let token = self.api.login_with_google(&id_token, role).await?;
        self.establish(token).await
    }

    /// Re-fetch the current user.
    pub async fn refresh(&self) -> Result<User, SessionError> {
        if !self.is_authenticated() {
            return Err(SessionError::NotSignedIn);
        }
        let user = self.api.current_user().await?;
        self.update(|session| session.user = user.clone());
        Ok(user)
    }

    /// Save the onboarding profile to the backend.
    ///
    /// The local copy is updated whether or not the save succeeds, so a
    /// transient failure never loses what the user entered; the failure
    /// is still returned.
    pub async fn update_onboarding_data(
        &self,
        profile: &IntakeProfile,
    ) -> Result<ProfileRecord, SessionError> {
        if !self.is_authenticated() {
            return Err(SessionError::NotSignedIn);
        }
        let _loading = LoadingGuard::start(&self.loading);
        let result = self.api.put_profile(profile).await;
        let synced = match &result {
            Ok(record) => record
                .onboarding_data
                .clone()
                .unwrap_or_else(|| profile.clone()),
            Err(e) => {
                tracing::warn!(error = %e, "Profile save failed; keeping local copy");
                profile.clone()
            }
        };
        self.update(|session| session.onboarding = Some(synced.clone()));
        Ok(result?)
    }

    /// Forget the session: memory, persisted copy, and onboarding
    /// snapshot. No server round trip.
    pub fn logout(&self) {
        let previous = match self.session.write() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        self.api.set_token(None);
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "Failed to clear persisted session");
        }
        if let (Some(snapshots), Some(session)) = (&self.snapshots, &previous) {
            if let Err(e) = snapshots.clear(session.user.id) {
                tracing::warn!(error = %e, "Failed to clear onboarding snapshot");
            }
        }
        if let Some(session) = previous {
            tracing::info!(user_id = session.user.id, "Signed out");
        }
    }

    /// Adopt a freshly issued token: fetch the user, then try to load
    /// their onboarding profile.
    async fn establish(&self, token: TokenResponse) -> Result<User, SessionError> {
        self.api.set_token(Some(token.access_token.clone()));
        let user = match self.api.current_user().await {
            Ok(user) => user,
            Err(e) => {
                self.api.set_token(self.token());
                return Err(e.into());
            }
        };

        // A missing profile is normal for new accounts.
        let onboarding = match self.api.get_profile().await {
            Ok(record) => record.onboarding_data,
            Err(e) => {
                tracing::debug!(user_id = user.id, error = %e, "No onboarding profile loaded");
                None
            }
        };

        let session = AuthSession {
            user: user.clone(),
            token: token.access_token,
            onboarding,
        };
        self.persist(&session);
        match self.session.write() {
            Ok(mut guard) => *guard = Some(session),
            Err(poisoned) => *poisoned.into_inner() = Some(session),
        }
        tracing::info!(user_id = user.id, role = ?user.role, "Signed in");
        Ok(user)
    }

    fn update(&self, change: impl FnOnce(&mut AuthSession)) {
        let updated = match self.session.write() {
            Ok(mut guard) => guard.as_mut().map(|session| {
                change(session);
                session.clone()
            }),
            Err(_) => None,
        };
        if let Some(session) = updated {
            self.persist(&session);
        }
    }

    fn persist(&self, session: &AuthSession) {
        if let Err(e) = self.store.save(session) {
            tracing::warn!(error = %e, "Failed to persist session");
        }
    }
}

#[async_trait]
impl ProfileService for SessionContext {
    async fn update_profile(&self, profile: &IntakeProfile) -> Result<ProfileRecord, ServiceError> {
        self.update_onboarding_data(profile)
            .await
            .map_err(|e| match e {
                SessionError::Api(api) => api.into(),
                other => ServiceError::new(other.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> AuthSession {
        AuthSession {
            user: User {
                id: 11,
                email: "a@b.co".into(),
                name: "Abena".into(),
                role: Role::User,
                is_active: true,
                created_at: None,
            },
            token: "t0k".into(),
            onboarding: None,
        }
    }

    fn api() -> ApiClient {
        ApiClient::with_client(reqwest::Client::new(), "http://127.0.0.1:9".into())
    }

    #[test]
    fn init_restores_persisted_session_and_token() {
        let store = Arc::new(MemorySessionStore::new());
        store.save(&session()).unwrap();

        let context = SessionContext::init(api(), store);
        assert!(context.is_authenticated());
        assert_eq!(context.api().token().as_deref(), Some("t0k"));
        assert!(!context.is_loading());
    }

    #[test]
    fn logout_clears_memory_store_and_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileSessionStore::new(dir.path()));
        store.save(&session()).unwrap();

        let context = SessionContext::init(api(), store.clone());
        context.logout();

        assert!(!context.is_authenticated());
        assert!(context.api().token().is_none());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn google_sign_in_requires_client_id() {
        let context = SessionContext::init(api(), Arc::new(MemorySessionStore::new()));
        assert!(matches!(
            context.begin_google_sign_in(),
            Err(SessionError::OAuth(OAuthError::MissingClientId))
        ));
    }

    #[tokio::test]
    async fn refresh_requires_a_session() {
        let context = SessionContext::init(api(), Arc::new(MemorySessionStore::new()));
        assert!(matches!(context.refresh().await, Err(SessionError::NotSignedIn)));
    }
}
