//! Integration tests for sign-in, session persistence and profile saves
//! against the in-process fake backend.

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use japa_client::api::{ApiClient, ApiError};
use japa_client::session::{FileSessionStore, MemorySessionStore, SessionContext, SessionError, SessionStore};
use japa_core::auth::{RegisterRequest, Role};
use japa_core::error::CoreError;
use japa_core::profile::IntakeProfile;
use serde_json::json;

fn context(base_url: &str) -> SessionContext {
    let api = ApiClient::with_client(reqwest::Client::new(), base_url.to_string());
    SessionContext::init(api, Arc::new(MemorySessionStore::new()))
}

fn registration(email: &str, password: &str) -> RegisterRequest {
    RegisterRequest {
        name: "Ama Mensah".into(),
        email: email.into(),
        password: password.into(),
        role: Role::User,
    }
}

// ---------------------------------------------------------------------------
// Test: login establishes a session even without a saved profile
// ---------------------------------------------------------------------------

#[tokio::test]
async fn login_without_profile_signs_in() {
    let (base_url, _state) = common::spawn().await;
    let session = context(&base_url);

    let user = session.login("ama@example.com", common::PASSWORD).await.unwrap();

    assert_eq!(user.id, 7);
    assert!(session.is_authenticated());
    assert!(!session.is_loading());
    assert_eq!(session.token().as_deref(), Some(common::TOKEN));
    assert_eq!(session.api().token().as_deref(), Some(common::TOKEN));
    assert!(session.onboarding().is_none());
}

// ---------------------------------------------------------------------------
// Test: login loads an existing onboarding profile
// ---------------------------------------------------------------------------

#[tokio::test]
async fn login_loads_saved_profile() {
    let (base_url, state) = common::spawn().await;
    state.lock().unwrap().profile = Some(json!({ "nationality": "GH", "skills": ["Nursing"] }));
    let session = context(&base_url);

    session.login("ama@example.com", common::PASSWORD).await.unwrap();

    let onboarding = session.onboarding().unwrap();
    assert_eq!(onboarding.personal.nationality.as_deref(), Some("GH"));
    assert_eq!(onboarding.skills.skills, Some(vec!["Nursing".to_string()]));
}

// ---------------------------------------------------------------------------
// Test: a rejected login surfaces the server's message and keeps no token
// ---------------------------------------------------------------------------

#[tokio::test]
async fn wrong_password_reports_server_detail() {
    let (base_url, _state) = common::spawn().await;
    let session = context(&base_url);

    let err = session.login("ama@example.com", "nope").await.unwrap_err();

    assert_matches!(
        &err,
        SessionError::Api(ApiError::Api { status: 401, message }) if message == "Incorrect email or password"
    );
    assert!(!session.is_authenticated());
    assert!(session.api().token().is_none());
}

// ---------------------------------------------------------------------------
// Test: registration validation happens before any request
// ---------------------------------------------------------------------------

#[tokio::test]
async fn short_password_is_rejected_locally() {
    // Nothing listens here; a request would fail with a transport error.
    let session = context("http://127.0.0.1:9");

    let err = session
        .register(&registration("ama@example.com", "abc"))
        .await
        .unwrap_err();

    assert_matches!(
        err,
        SessionError::Invalid(CoreError::Validation(message))
            if message == "Password must be at least 6 characters"
    );
}

#[tokio::test]
async fn register_joins_validation_messages() {
    let (base_url, _state) = common::spawn().await;
    let session = context(&base_url);

    let err = session
        .register(&registration("taken@example.com", "secret1"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Email already registered");

    let user = session
        .register(&registration("ama@example.com", "secret1"))
        .await
        .unwrap();
    assert_eq!(user.email, "ama@example.com");
}

// ---------------------------------------------------------------------------
// Test: the session survives a restart through the file store
// ---------------------------------------------------------------------------

#[tokio::test]
async fn session_is_restored_from_disk_and_cleared_on_logout() {
    let (base_url, _state) = common::spawn().await;
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileSessionStore::new(dir.path()));

    let first = SessionContext::init(
        ApiClient::with_client(reqwest::Client::new(), base_url.clone()),
        store.clone(),
    );
    first.login("ama@example.com", common::PASSWORD).await.unwrap();
    drop(first);

    let restored = SessionContext::init(
        ApiClient::with_client(reqwest::Client::new(), base_url),
        store.clone(),
    );
    assert!(restored.is_authenticated());
    assert_eq!(restored.api().token().as_deref(), Some(common::TOKEN));
    assert_eq!(restored.refresh().await.unwrap().name, "Ama Mensah");

    restored.logout();
    assert!(!restored.is_authenticated());
    assert!(restored.api().token().is_none());
    assert!(store.load().unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Test: a failed profile save keeps the local copy and reports the error
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_profile_save_keeps_local_copy() {
    let (base_url, state) = common::spawn().await;
    let session = context(&base_url);
    session.login("ama@example.com", common::PASSWORD).await.unwrap();

    let mut profile = IntakeProfile::default();
    profile.personal.nationality = Some("KE".into());

    state.lock().unwrap().fail_profile_save = true;
    let err = session.update_onboarding_data(&profile).await.unwrap_err();
    assert_matches!(err, SessionError::Api(ApiError::Api { status: 500, .. }));
    assert_eq!(session.onboarding(), Some(profile.clone()));

    state.lock().unwrap().fail_profile_save = false;
    let record = session.update_onboarding_data(&profile).await.unwrap();
    assert_eq!(record.onboarding_data, Some(profile));
    assert_eq!(state.lock().unwrap().profile_puts, 1);
}

#[tokio::test]
async fn profile_save_requires_sign_in() {
    let session = context("http://127.0.0.1:9");
    let err = session
        .update_onboarding_data(&IntakeProfile::default())
        .await
        .unwrap_err();
    assert_matches!(err, SessionError::NotSignedIn);
}
