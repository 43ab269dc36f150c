//! HTTP server for the course assistant.
//!
//! Exposes the question-answering loop and catalog reads as a small JSON
//! API for web frontends.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/query` | Answer a question; creates a session when none given |
//! | `GET`  | `/api/courses` | Course catalog statistics (count + titles) |
//! | `POST` | `/api/clear-session` | Forget one conversation |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses share one schema:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `chat_disabled` (400), `internal` (500).
//!
//! # Startup
//!
//! When `[corpus]` is configured, the corpus folder is ingested (skipping
//! already-present titles) before the listener starts, so a fresh server
//! answers from a warm catalog.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! frontends served from other origins.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::chat::{create_chat_provider, ChatProvider};
use crate::config::Config;
use crate::db;
use crate::ingest;
use crate::orchestrator;
use crate::session::SessionStore;
use crate::store::CourseStore;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    store: Arc<CourseStore>,
    chat: Arc<dyn ChatProvider>,
    sessions: Arc<SessionStore>,
}

/// Starts the HTTP server.
///
/// Binds to the address configured in `[server].bind` and registers all
/// route handlers. The server runs indefinitely until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let config = Arc::new(config.clone());

    let pool = db::connect(&config).await?;
    let store = Arc::new(CourseStore::new(pool, &config)?);
    let chat: Arc<dyn ChatProvider> = Arc::from(create_chat_provider(&config.chat)?);
    let sessions = Arc::new(SessionStore::new(config.chat.max_history));

    // Warm the catalog from the corpus folder before accepting queries
    if let Some(corpus) = &config.corpus {
        let report = ingest::ingest_folder(&store, &config, &corpus.dir).await?;
        println!(
            "corpus load: {} courses added, {} skipped, {} errors",
            report.courses_added, report.courses_skipped, report.errors
        );
    }

    let state = AppState {
        config,
        store,
        chat,
        sessions,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/query", post(handle_query))
        .route("/api/courses", get(handle_courses))
        .route("/api/clear-session", post(handle_clear_session))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("Server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Inner error detail with a machine-readable code and human-readable message.
#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
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

/// Constructs a 400 Bad Request error.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// Constructs a 500 Internal Server Error.
fn internal_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Inspects answer-path errors and maps them to the most appropriate
/// HTTP status. A disabled chat provider is a configuration problem the
/// client can act on, so it reports as 400 rather than 500.
fn classify_answer_error(err: anyhow::Error) -> AppError {
    let msg = err.to_string();
    if msg.contains("disabled") {
        let mut e = bad_request(msg);
        e.code = "chat_disabled".to_string();
        e
    } else {
        internal_error(msg)
    }
}

// ============ POST /api/query ============

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    session_id: Option<String>,
}

#[derive(Serialize)]
struct QueryResponse {
    answer: String,
    /// Display strings, e.g. `"Intro to Rust - Lesson 2"`.
    sources: Vec<String>,
    session_id: String,
}

/// Handler for `POST /api/query`.
///
/// Runs the full retrieval loop for one question. A request without a
/// `session_id` gets a fresh session whose id is returned for follow-ups.
async fn handle_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let session_id = match req.session_id {
        Some(id) => id,
        None => state.sessions.create_session().await,
    };

    let result = orchestrator::answer(
        &state.store,
        state.chat.as_ref(),
        &state.sessions,
        &state.config.chat,
        &session_id,
        &req.query,
    )
    .await
    .map_err(classify_answer_error)?;

    Ok(Json(QueryResponse {
        answer: result.text,
        sources: result.sources.iter().map(|s| s.to_string()).collect(),
        session_id,
    }))
}

// ============ GET /api/courses ============

#[derive(Serialize)]
struct CoursesResponse {
    total_courses: usize,
    course_titles: Vec<String>,
}

/// Handler for `GET /api/courses`.
///
/// Catalog statistics for frontends: how many courses exist and their
/// exact titles, sorted.
async fn handle_courses(
    State(state): State<AppState>,
) -> Result<Json<CoursesResponse>, AppError> {
    let courses = state
        .store
        .list_courses()
        .await
        .map_err(|e| internal_error(e.to_string()))?;

    let course_titles: Vec<String> = courses.into_iter().map(|c| c.title).collect();
    Ok(Json(CoursesResponse {
        total_courses: course_titles.len(),
        course_titles,
    }))
}

// ============ POST /api/clear-session ============

#[derive(Deserialize)]
struct ClearSessionRequest {
    session_id: String,
}

#[derive(Serialize)]
struct ClearSessionResponse {
    success: bool,
    message: String,
}

/// Handler for `POST /api/clear-session`.
///
/// Clearing is idempotent: unknown session ids also report success.
async fn handle_clear_session(
    State(state): State<AppState>,
    Json(req): Json<ClearSessionRequest>,
) -> Json<ClearSessionResponse> {
    state.sessions.clear(&req.session_id).await;
    Json(ClearSessionResponse {
        success: true,
        message: format!("Session {} cleared successfully", req.session_id),
    })
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
}

/// Handler for `GET /health`.
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
