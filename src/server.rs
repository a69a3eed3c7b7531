//! JSON HTTP API over the shared chat session and source store.
//!
//! # Endpoints
//!
//! | Method   | Path                        | Description |
//! |----------|-----------------------------|-------------|
//! | `GET`    | `/health`                   | Health check (returns version) |
//! | `POST`   | `/api/login`                | Admin passphrase gate |
//! | `GET`    | `/api/sources`              | List sources (optionally by category) |
//! | `POST`   | `/api/sources`              | Add a source (text, base64 file, or URL) |
//! | `DELETE` | `/api/sources/{id}`         | Remove a source |
//! | `POST`   | `/api/sources/{id}/selected`| Flip a source's participation flag |
//! | `POST`   | `/api/chat`                 | Ask a question in a category |
//! | `POST`   | `/api/tts`                  | Synthesize speech for a text |
//! | `POST`   | `/api/clear`                | Reset the session and empty the store |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401), `not_found` (404),
//! `reply_pending` (409), `tts_disabled` (400), `tts_failed` (502),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the browser front-end
//! can be served from anywhere.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::engine::AnswerEngine;
use crate::ingest;
use crate::models::{Category, Source, SourceDraft, SourceKind};
use crate::remote::GeminiChat;
use crate::session::{ChatSession, SessionError};
use crate::speech::{GeminiTts, SpeechError, SpeechSynthesizer};
use crate::store::{JsonFileRepository, SourceStore};

/// Shared application state. Session and store live under one lock because
/// a chat turn reads the store while mutating the session.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    inner: Arc<Mutex<SharedState>>,
    engine: Arc<AnswerEngine>,
    tts: Option<Arc<dyn SpeechSynthesizer>>,
    http: reqwest::Client,
}

struct SharedState {
    session: ChatSession,
    store: SourceStore,
}

/// Starts the HTTP server on `[server].bind` and runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let store = SourceStore::with_repository(Box::new(JsonFileRepository::new(
        config.store.path.clone(),
    )));
    let engine = AnswerEngine::new(
        GeminiChat::from_config(&config.model)
            .map(|s| Box::new(s) as Box<dyn crate::engine::AnswerStrategy>),
    );
    let tts = GeminiTts::from_config(&config.tts, &config.model.endpoint)
        .map(|t| Arc::new(t) as Arc<dyn SpeechSynthesizer>);

    let state = AppState {
        config: Arc::new(config.clone()),
        inner: Arc::new(Mutex::new(SharedState {
            session: ChatSession::new(),
            store,
        })),
        engine: Arc::new(engine),
        tts,
        http: reqwest::Client::new(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router(state).layer(cors);

    println!("murshid server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/api/login", post(handle_login))
        .route("/api/sources", get(handle_list_sources).post(handle_add_source))
        .route("/api/sources/{id}", delete(handle_remove_source))
        .route("/api/sources/{id}/selected", post(handle_set_selected))
        .route("/api/chat", post(handle_chat))
        .route("/api/tts", post(handle_tts))
        .route("/api/clear", post(handle_clear))
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn unauthorized(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn reply_pending() -> AppError {
    AppError {
        status: StatusCode::CONFLICT,
        code: "reply_pending".to_string(),
        message: "a reply is still pending for this conversation".to_string(),
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::EmptyMessage => bad_request("question must not be empty"),
            SessionError::ReplyPending => reply_pending(),
            SessionError::UnknownSource(id) => not_found(format!("no source with id: {}", id)),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/login ============

#[derive(Deserialize)]
struct LoginRequest {
    passphrase: String,
}

#[derive(Serialize)]
struct LoginResponse {
    admin: bool,
}

async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let mut shared = state.inner.lock().await;
    if shared
        .session
        .login(&req.passphrase, &state.config.admin.passphrase)
    {
        Ok(Json(LoginResponse { admin: true }))
    } else {
        Err(unauthorized("wrong passphrase"))
    }
}

// ============ GET /api/sources ============

/// Source metadata without the payload body; base64 blobs stay server-side.
#[derive(Serialize)]
struct SourceInfo {
    id: String,
    name: String,
    kind: SourceKind,
    category: Category,
    selected: bool,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<&Source> for SourceInfo {
    fn from(source: &Source) -> Self {
        Self {
            id: source.id.clone(),
            name: source.name.clone(),
            kind: source.kind,
            category: source.category,
            selected: source.selected,
            created_at: source.created_at,
        }
    }
}

#[derive(Deserialize)]
struct ListSourcesQuery {
    category: Option<Category>,
}

#[derive(Serialize)]
struct SourceListResponse {
    sources: Vec<SourceInfo>,
}

async fn handle_list_sources(
    State(state): State<AppState>,
    Query(query): Query<ListSourcesQuery>,
) -> Json<SourceListResponse> {
    let shared = state.inner.lock().await;
    let sources = match query.category {
        Some(category) => shared
            .store
            .list_by_category(category)
            .into_iter()
            .map(SourceInfo::from)
            .collect(),
        None => shared.store.all().iter().map(SourceInfo::from).collect(),
    };
    Json(SourceListResponse { sources })
}

// ============ POST /api/sources ============

/// Exactly one of `text`, `data`, or `url` must be present.
#[derive(Deserialize)]
struct AddSourceRequest {
    category: Category,
    name: Option<String>,
    text: Option<String>,
    /// Base64 file content; requires `file_name` for the MIME lookup.
    data: Option<String>,
    file_name: Option<String>,
    url: Option<String>,
}

async fn handle_add_source(
    State(state): State<AppState>,
    Json(req): Json<AddSourceRequest>,
) -> Result<(StatusCode, Json<SourceInfo>), AppError> {
    let mut shared = state.inner.lock().await;
    require_admin(&shared.session)?;
    // URL drafts fetch while the lock is held; acceptable for the
    // single-session deployment this serves.
    let draft = draft_from_request(&state, &req).await?;
    let info = SourceInfo::from(shared.store.add(draft));
    Ok((StatusCode::CREATED, Json(info)))
}

async fn draft_from_request(
    state: &AppState,
    req: &AddSourceRequest,
) -> Result<SourceDraft, AppError> {
    match (&req.text, &req.data, &req.url) {
        (Some(text), None, None) => Ok(ingest::draft_from_text(
            text,
            req.category,
            req.name.clone(),
        )),
        (None, Some(data), None) => {
            let file_name = req
                .file_name
                .as_deref()
                .ok_or_else(|| bad_request("file_name is required with data"))?;
            let bytes = BASE64
                .decode(data)
                .map_err(|e| bad_request(format!("invalid base64 data: {}", e)))?;
            let mut draft = ingest::draft_from_bytes(&bytes, file_name, req.category);
            if let Some(name) = &req.name {
                draft.name = name.clone();
            }
            Ok(draft)
        }
        (None, None, Some(url)) => {
            let mut draft = ingest::draft_from_url(&state.http, url, req.category)
                .await
                .map_err(|e| bad_request(format!("{:#}", e)))?;
            if let Some(name) = &req.name {
                draft.name = name.clone();
            }
            Ok(draft)
        }
        _ => Err(bad_request(
            "exactly one of text, data, or url must be provided",
        )),
    }
}

fn require_admin(session: &ChatSession) -> Result<(), AppError> {
    if session.is_admin() {
        Ok(())
    } else {
        Err(unauthorized("admin login required"))
    }
}

// ============ DELETE /api/sources/{id} ============

async fn handle_remove_source(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let mut shared = state.inner.lock().await;
    require_admin(&shared.session)?;
    if shared.session.focused_source() == Some(id.as_str()) {
        shared.session.clear_focus();
    }
    shared.store.remove(&id);
    Ok(StatusCode::NO_CONTENT)
}

// ============ POST /api/sources/{id}/selected ============

#[derive(Deserialize)]
struct SetSelectedRequest {
    selected: bool,
}

async fn handle_set_selected(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SetSelectedRequest>,
) -> Result<Json<SourceInfo>, AppError> {
    let mut shared = state.inner.lock().await;
    require_admin(&shared.session)?;
    shared.store.set_selected(&id, req.selected);
    match shared.store.get(&id) {
        Some(source) => Ok(Json(SourceInfo::from(source))),
        None => Err(not_found(format!("no source with id: {}", id))),
    }
}

// ============ POST /api/chat ============

#[derive(Deserialize)]
struct ChatRequest {
    question: String,
    category: Category,
    /// Focus this source for the turn; focus persists until changed.
    focused_source_id: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    answer: String,
    message_id: String,
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let mut shared = state.inner.lock().await;
    shared.session.set_active(req.category);

    if let Some(id) = &req.focused_source_id {
        if shared.session.focused_source() != Some(id.as_str()) {
            let SharedState { session, store } = &mut *shared;
            session.focus_source(store, id)?;
        }
    }

    let SharedState { session, store } = &mut *shared;
    let reply = session.send(&state.engine, store, &req.question).await?;

    Ok(Json(ChatResponse {
        answer: reply.text,
        message_id: reply.id,
    }))
}

// ============ POST /api/tts ============

#[derive(Deserialize)]
struct TtsRequest {
    text: String,
}

#[derive(Serialize)]
struct TtsResponse {
    /// Base64 PCM: 24 kHz, 16-bit signed LE, mono.
    audio: String,
}

async fn handle_tts(
    State(state): State<AppState>,
    Json(req): Json<TtsRequest>,
) -> Result<Json<TtsResponse>, AppError> {
    if req.text.trim().is_empty() {
        return Err(bad_request("text must not be empty"));
    }
    let tts = state.tts.as_ref().ok_or_else(|| AppError {
        status: StatusCode::BAD_REQUEST,
        code: "tts_disabled".to_string(),
        message: crate::phrases::TTS_NOT_CONFIGURED.to_string(),
    })?;

    let pcm = tts.synthesize(&req.text).await.map_err(tts_error)?;
    Ok(Json(TtsResponse {
        audio: BASE64.encode(pcm),
    }))
}

/// The error-body message is user-facing (and a candidate TTS input), so
/// it carries a fixed Arabic phrase; the technical detail stays in the log.
fn tts_error(err: SpeechError) -> AppError {
    tracing::warn!("speech synthesis failed: {}", err);
    let message = match err {
        SpeechError::Status(429) => crate::phrases::TTS_BUSY,
        _ => crate::phrases::TTS_FAILED,
    };
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "tts_failed".to_string(),
        message: message.to_string(),
    }
}

// ============ POST /api/clear ============

#[derive(Deserialize)]
struct ClearRequest {
    confirm: bool,
}

async fn handle_clear(
    State(state): State<AppState>,
    Json(req): Json<ClearRequest>,
) -> Result<StatusCode, AppError> {
    if !req.confirm {
        return Err(bad_request("confirm must be true"));
    }
    let mut shared = state.inner.lock().await;
    require_admin(&shared.session)?;
    let SharedState { session, store } = &mut *shared;
    session.clear_all(store);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState {
            config: Arc::new(Config::default()),
            inner: Arc::new(Mutex::new(SharedState {
                session: ChatSession::new(),
                store: SourceStore::in_memory(),
            })),
            engine: Arc::new(AnswerEngine::new(None)),
            tts: None,
            http: reqwest::Client::new(),
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn login(app: &Router) {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/login",
                serde_json::json!({ "passphrase": "murshid2025" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_reports_version() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn wrong_passphrase_is_unauthorized() {
        let app = router(test_state());
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/login",
                serde_json::json!({ "passphrase": "wrong" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "unauthorized");
    }

    #[tokio::test]
    async fn adding_a_source_requires_admin() {
        let app = router(test_state());
        let add = serde_json::json!({
            "category": "advisor",
            "text": "بدل السكن 25%"
        });

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/sources", add.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        login(&app).await;
        let response = app
            .oneshot(json_request("POST", "/api/sources", add))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["kind"], "text");
        assert_eq!(body["selected"], true);
    }

    #[tokio::test]
    async fn sources_can_be_listed_by_category() {
        let app = router(test_state());
        login(&app).await;
        for (category, text) in [("advisor", "أ"), ("repository", "ب")] {
            let response = app
                .clone()
                .oneshot(json_request(
                    "POST",
                    "/api/sources",
                    serde_json::json!({ "category": category, "text": text }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = app
            .oneshot(
                Request::get("/api/sources?category=repository")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["sources"].as_array().unwrap().len(), 1);
        assert_eq!(body["sources"][0]["category"], "repository");
    }

    #[tokio::test]
    async fn chat_answers_from_sources_and_returns_message_id() {
        let app = router(test_state());
        login(&app).await;
        app.clone()
            .oneshot(json_request(
                "POST",
                "/api/sources",
                serde_json::json!({
                    "category": "advisor",
                    "text": "بدل السكن 25% من الراتب الأساسي"
                }),
            ))
            .await
            .unwrap();

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/chat",
                serde_json::json!({ "question": "كم بدل السكن؟", "category": "advisor" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["answer"].as_str().unwrap().contains("بدل السكن 25%"));
        assert!(!body["message_id"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn chat_with_empty_store_returns_no_sources_phrase() {
        let app = router(test_state());
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/chat",
                serde_json::json!({ "question": "سؤال", "category": "advisor" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["answer"], crate::phrases::NO_SOURCES);
    }

    #[tokio::test]
    async fn empty_question_is_bad_request() {
        let app = router(test_state());
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/chat",
                serde_json::json!({ "question": "  ", "category": "advisor" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn unknown_focused_source_is_not_found() {
        let app = router(test_state());
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/chat",
                serde_json::json!({
                    "question": "سؤال",
                    "category": "repository",
                    "focused_source_id": "missing"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn tts_without_provider_is_rejected() {
        let app = router(test_state());
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/tts",
                serde_json::json!({ "text": "مرحباً" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "tts_disabled");
        assert_eq!(body["error"]["message"], crate::phrases::TTS_NOT_CONFIGURED);
    }

    #[test]
    fn tts_failures_surface_fixed_arabic_phrases() {
        let busy = tts_error(SpeechError::Status(429));
        assert_eq!(busy.message, crate::phrases::TTS_BUSY);
        assert_eq!(busy.status, StatusCode::BAD_GATEWAY);

        for err in [
            SpeechError::Status(500),
            SpeechError::Transport("connection refused".to_string()),
            SpeechError::Malformed("no audio data in response".to_string()),
        ] {
            let mapped = tts_error(err);
            assert_eq!(mapped.message, crate::phrases::TTS_FAILED);
            assert_eq!(mapped.code, "tts_failed");
        }
    }

    #[tokio::test]
    async fn clear_requires_confirmation_and_admin() {
        let app = router(test_state());
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/clear",
                serde_json::json!({ "confirm": false }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/clear",
                serde_json::json!({ "confirm": true }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        login(&app).await;
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/clear",
                serde_json::json!({ "confirm": true }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn removing_a_source_is_idempotent_over_http() {
        let app = router(test_state());
        login(&app).await;
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/sources",
                serde_json::json!({ "category": "advisor", "text": "نص" }),
            ))
            .await
            .unwrap();
        let body = body_json(response).await;
        let id = body["id"].as_str().unwrap().to_string();

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(
                    Request::delete(format!("/api/sources/{}", id))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
        }
    }
}
