//! In-process fake of the Japa backend and the storage REST API.
//!
//! Each test spawns its own server on an ephemeral port and inspects or
//! tweaks the shared [`Backend`] state directly.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::header::{AUTHORIZATION, HOST};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Form, Json, Router};
use serde_json::{json, Value};

use japa_client::api::ApiClient;

pub const TOKEN: &str = "token-123";
pub const PASSWORD: &str = "secret1";
pub const BUCKET: &str = "japa-test";

#[derive(Debug, Default)]
pub struct Backend {
    pub profile: Option<Value>,
    pub profile_puts: usize,
    pub fail_profile_save: bool,
    pub fail_recommendations: bool,
    pub empty_recommendations: bool,
    pub recommendation_requests: Vec<Value>,
    pub documents: Vec<Value>,
    pub messages: Vec<Value>,
    pub message_fetches: usize,
    pub fetches_by_conversation: HashMap<i64, usize>,
    pub upload_sessions: HashMap<String, (String, Vec<u8>)>,
    pub upload_commands: Vec<String>,
    pub objects: HashMap<String, Vec<u8>>,
    pub chat_requests: Vec<Value>,
}

pub type Shared = Arc<Mutex<Backend>>;

type Failure = (StatusCode, Json<Value>);

fn detail(status: StatusCode, message: &str) -> Failure {
    (status, Json(json!({ "detail": message })))
}

fn authorize(headers: &HeaderMap) -> Result<(), Failure> {
    let expected = format!("Bearer {TOKEN}");
    match headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(value) if value == expected => Ok(()),
        _ => Err(detail(StatusCode::UNAUTHORIZED, "Could not validate credentials")),
    }
}

pub fn user_json() -> Value {
    json!({
        "id": 7,
        "email": "ama@example.com",
        "name": "Ama Mensah",
        "role": "USER",
        "is_active": true,
    })
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

async fn login(Form(form): Form<HashMap<String, String>>) -> Result<Json<Value>, Failure> {
    if form.get("username").map(String::as_str) == Some("ama@example.com")
        && form.get("password").map(String::as_str) == Some(PASSWORD)
    {
        Ok(Json(json!({ "access_token": TOKEN, "token_type": "bearer" })))
    } else {
        Err(detail(StatusCode::UNAUTHORIZED, "Incorrect email or password"))
    }
}

async fn register(Json(body): Json<Value>) -> Result<Json<Value>, Failure> {
    if body["email"] == "taken@example.com" {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "detail": [
                { "loc": ["body", "email"], "msg": "Email already registered", "type": "value_error" }
            ]})),
        ));
    }
    Ok(Json(json!({ "access_token": TOKEN })))
}

async fn me(headers: HeaderMap) -> Result<Json<Value>, Failure> {
    authorize(&headers)?;
    Ok(Json(user_json()))
}

// ---------------------------------------------------------------------------
// Profile and recommendations
// ---------------------------------------------------------------------------

fn profile_record(data: &Value) -> Value {
    json!({
        "id": 1,
        "user_id": 7,
        "onboarding_data": data,
        "created_at": "2025-01-01T00:00:00Z",
        "updated_at": "2025-01-02T00:00:00Z",
    })
}

async fn get_profile(State(state): State<Shared>, headers: HeaderMap) -> Result<Json<Value>, Failure> {
    authorize(&headers)?;
    let backend = state.lock().unwrap();
    match &backend.profile {
        Some(data) => Ok(Json(profile_record(data))),
        None => Err(detail(StatusCode::NOT_FOUND, "Profile not found")),
    }
}

async fn put_profile(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, Failure> {
    authorize(&headers)?;
    let mut backend = state.lock().unwrap();
    if backend.fail_profile_save {
        return Err(detail(StatusCode::INTERNAL_SERVER_ERROR, "Database unavailable"));
    }
    backend.profile_puts += 1;
    let data = body["onboarding_data"].clone();
    backend.profile = Some(data.clone());
    Ok(Json(profile_record(&data)))
}

async fn recommendations(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, Failure> {
    authorize(&headers)?;
    let mut backend = state.lock().unwrap();
    backend.recommendation_requests.push(body);
    if backend.fail_recommendations {
        return Err(detail(StatusCode::BAD_GATEWAY, "Model unavailable"));
    }
    let options = if backend.empty_recommendations {
        json!([])
    } else {
        json!([{
            "visa_type": "Express Entry",
            "reasoning": "Strong language scores",
            "likelihood": "high",
        }])
    };
    Ok(Json(json!({ "summary": "One strong pathway", "options": options })))
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

async fn list_documents(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Value>, Failure> {
    authorize(&headers)?;
    let backend = state.lock().unwrap();
    let docs: Vec<Value> = backend
        .documents
        .iter()
        .filter(|d| match query.get("status_filter") {
            Some(status) => d["status"] == status.as_str(),
            None => true,
        })
        .cloned()
        .collect();
    Ok(Json(Value::Array(docs)))
}

async fn create_document(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Result<Json<Value>, Failure> {
    authorize(&headers)?;
    let mut backend = state.lock().unwrap();
    let id = backend.documents.len() as i64 + 1;
    body["id"] = json!(id);
    body["status"] = json!("pending");
    body["uploaded_at"] = json!("2025-03-04T10:00:00Z");
    backend.documents.push(body.clone());
    Ok(Json(body))
}

async fn delete_document(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Value>, Failure> {
    authorize(&headers)?;
    let mut backend = state.lock().unwrap();
    let before = backend.documents.len();
    backend.documents.retain(|d| d["id"] != id);
    if backend.documents.len() == before {
        return Err(detail(StatusCode::NOT_FOUND, "Document not found"));
    }
    Ok(Json(json!({ "message": "Document deleted" })))
}

// ---------------------------------------------------------------------------
// Messaging
// ---------------------------------------------------------------------------

async fn get_conversation(headers: HeaderMap, Path(id): Path<i64>) -> Result<Json<Value>, Failure> {
    authorize(&headers)?;
    Ok(Json(json!({
        "id": id,
        "user_id": 7,
        "agent_id": 3,
        "agent_business_name": "Wings Travel",
        "agent_owner_name": "Efua",
    })))
}

async fn start_conversation(headers: HeaderMap, Json(body): Json<Value>) -> Result<Json<Value>, Failure> {
    authorize(&headers)?;
    Ok(Json(json!({
        "id": 11,
        "user_id": 7,
        "agent_id": body["agent_id"],
        "last_message_preview": body["initial_message"],
    })))
}

async fn profile_summary(headers: HeaderMap, Path(user_id): Path<i64>) -> Result<Json<Value>, Failure> {
    authorize(&headers)?;
    Ok(Json(json!({
        "name": "Ama Mensah",
        "country_of_origin": "GH",
        "desired_destination_country": format!("CA (user {user_id})"),
        "budget_range": { "max_budget_usd": 25000.0 },
    })))
}

async fn list_messages(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Value>, Failure> {
    authorize(&headers)?;
    let mut backend = state.lock().unwrap();
    backend.message_fetches += 1;
    *backend.fetches_by_conversation.entry(id).or_default() += 1;
    let messages: Vec<Value> = backend
        .messages
        .iter()
        .filter(|m| m["conversation_id"] == id)
        .cloned()
        .collect();
    Ok(Json(Value::Array(messages)))
}

async fn send_message(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, Failure> {
    authorize(&headers)?;
    let mut backend = state.lock().unwrap();
    let message = json!({
        "id": backend.messages.len() as i64 + 1,
        "conversation_id": id,
        "sender_id": 7,
        "content": body["content"],
        "created_at": "2025-03-04T10:00:00",
    });
    backend.messages.push(message.clone());
    Ok(Json(message))
}

// ---------------------------------------------------------------------------
// Assistant
// ---------------------------------------------------------------------------

async fn chat(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    state.lock().unwrap().chat_requests.push(body.clone());
    let mut history = body["conversation_history"].as_array().cloned().unwrap_or_default();
    history.push(json!({ "role": "user", "content": body["message"] }));
    history.push(json!({ "role": "assistant", "content": "JAPA helps you relocate." }));
    Json(json!({ "response": "JAPA helps you relocate.", "conversation_history": history }))
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

async fn start_upload(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(bucket): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if bucket != BUCKET {
        return detail(StatusCode::NOT_FOUND, "bucket").into_response();
    }
    let Some(name) = query.get("name").cloned() else {
        return detail(StatusCode::BAD_REQUEST, "name required").into_response();
    };
    let host = headers
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("127.0.0.1")
        .to_string();

    let mut backend = state.lock().unwrap();
    let session = format!("s{}", backend.upload_sessions.len() + 1);
    backend
        .upload_sessions
        .insert(session.clone(), (name, Vec::new()));
    (
        [("X-Goog-Upload-URL", format!("http://{host}/upload/{session}"))],
        Json(json!({})),
    )
        .into_response()
}

async fn upload_chunk(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(session): Path<String>,
    body: axum::body::Bytes,
) -> Response {
    let command = headers
        .get("X-Goog-Upload-Command")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let offset: usize = headers
        .get("X-Goog-Upload-Offset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(usize::MAX);

    let mut backend = state.lock().unwrap();
    backend.upload_commands.push(command.clone());
    let Some((name, bytes)) = backend.upload_sessions.get_mut(&session) else {
        return detail(StatusCode::NOT_FOUND, "session").into_response();
    };
    if offset != bytes.len() {
        return detail(StatusCode::BAD_REQUEST, "bad offset").into_response();
    }
    bytes.extend_from_slice(&body);
    if !command.contains("finalize") {
        return Json(json!({})).into_response();
    }
    let name = name.clone();
    let bytes = std::mem::take(bytes);
    backend.upload_sessions.remove(&session);
    backend.objects.insert(name.clone(), bytes);
    Json(json!({ "name": name, "bucket": BUCKET, "downloadTokens": "dl-token" })).into_response()
}

async fn delete_object(
    State(state): State<Shared>,
    Path((_bucket, object)): Path<(String, String)>,
) -> Response {
    match state.lock().unwrap().objects.remove(&object) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => detail(StatusCode::NOT_FOUND, "object").into_response(),
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

pub fn router(state: Shared) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/me", get(me))
        .route("/profile", get(get_profile).put(put_profile))
        .route("/recommendations", post(recommendations))
        .route("/documents", get(list_documents).post(create_document))
        .route("/documents/{id}", delete(delete_document))
        .route("/messaging/conversations", post(start_conversation))
        .route("/messaging/conversations/{id}", get(get_conversation))
        .route(
            "/messaging/conversations/{id}/messages",
            get(list_messages).post(send_message),
        )
        .route("/messaging/users/{id}/profile-summary", get(profile_summary))
        .route("/chat", post(chat))
        .route("/v0/b/{bucket}/o", post(start_upload))
        .route("/v0/b/{bucket}/o/{object}", delete(delete_object))
        .route("/upload/{session}", post(upload_chunk))
        .with_state(state)
}

/// Start a fake backend; returns its base URL and shared state.
pub async fn spawn() -> (String, Shared) {
    let state = Shared::default();
    let app = router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), state)
}

/// A client pointed at `base_url`, already holding the test token.
pub fn authed_client(base_url: &str) -> ApiClient {
    let api = ApiClient::with_client(reqwest::Client::new(), base_url.to_string());
    api.set_token(Some(TOKEN.to_string()));
    api
}
