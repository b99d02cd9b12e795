//! HTTP API server.
//!
//! Exposes question answering, the course catalog and session reset.

use crate::assistant::CourseAssistant;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::tools::Source;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Shared application state.
pub struct AppState {
    pub assistant: CourseAssistant,
}

/// Run the HTTP API server.
pub async fn run_serve(
    host: Option<String>,
    port: Option<u16>,
    docs: Option<PathBuf>,
    settings: Settings,
) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let assistant = CourseAssistant::from_settings(&settings)?;

    let docs_dir = docs.unwrap_or_else(|| settings.docs_dir());
    if docs_dir.is_dir() {
        let spinner = Output::spinner(&format!("Loading courses from {}...", docs_dir.display()));
        let report = assistant.ingest(&docs_dir, false).await;
        spinner.finish_and_clear();
        match report {
            Ok(report) => Output::info(&format!(
                "Loaded {} courses ({} chunks), {} already indexed",
                report.courses_added, report.chunks_added, report.skipped
            )),
            Err(e) => Output::warning(&format!("Could not load documents: {}", e)),
        }
    }

    let app = router(Arc::new(AppState { assistant }));

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Lektor API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET    /health");
    Output::kv("Query", "POST   /api/query");
    Output::kv("Courses", "GET    /api/courses");
    Output::kv("End session", "DELETE /api/session/{id}");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/query", post(query))
        .route("/api/courses", get(courses))
        .route("/api/session/{session_id}", delete(end_session))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Serialize)]
struct QueryResponse {
    answer: String,
    sources: Vec<Source>,
    session_id: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

fn internal_error(e: impl std::fmt::Display) -> Response {
    error!("Request failed: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            detail: e.to_string(),
        }),
    )
        .into_response()
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn query(State(state): State<Arc<AppState>>, Json(req): Json<QueryRequest>) -> Response {
    let session_id = match req.session_id {
        Some(id) => id,
        None => state.assistant.sessions().create_session().await,
    };

    match state.assistant.query(&req.query, Some(&session_id)).await {
        Ok(response) => Json(QueryResponse {
            answer: response.answer,
            sources: response.sources,
            session_id,
        })
        .into_response(),
        Err(e) => internal_error(e),
    }
}

async fn courses(State(state): State<Arc<AppState>>) -> Response {
    match state.assistant.course_analytics().await {
        Ok(analytics) => Json(analytics).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn end_session(State(state): State<Arc<AppState>>, Path(session_id): Path<String>) -> impl IntoResponse {
    if state.assistant.sessions().clear_session(&session_id).await {
        info!("Cleared {}", session_id);
    }
    Json(serde_json::json!({ "status": "ok" }))
}
