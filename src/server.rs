//! HTTP host API for Sonar.
//!
//! Exposes the session controls (start, stop) and the log buffer
//! (tail, clear, export) as JSON endpoints.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

use crate::config::SessionConfig;
use crate::log_buffer::{LogEntry, export_file_name};
use crate::session::{EngineState, Session, SessionError};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Session>,
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

/// Current session state and the configuration of the last accepted start.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub state: EngineState,
    pub config: Option<SessionConfig>,
}

/// Query parameters for the logs API.
#[derive(Debug, Deserialize)]
pub struct LogsQueryParams {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Errors surfaced by API handlers.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Session(SessionError::Config(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Session(SessionError::EngineUnavailable(_) | SessionError::Disposed) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let app_state = Arc::new(state);

    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/api/session", get(session_handler))
        .route("/api/session/start", post(start_handler))
        .route("/api/session/stop", post(stop_handler))
        .route("/api/logs", get(logs_handler).delete(clear_logs_handler))
        .route("/api/logs/export", get(export_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

/// Liveness probe.
async fn healthz_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

fn session_snapshot(session: &Session) -> SessionResponse {
    SessionResponse {
        state: session.state(),
        config: session.config(),
    }
}

async fn session_handler(State(state): State<Arc<AppState>>) -> Json<SessionResponse> {
    Json(session_snapshot(&state.session))
}

/// Start (or restart) probing. Accepts the engine's start payload.
async fn start_handler(
    State(state): State<Arc<AppState>>,
    Json(config): Json<SessionConfig>,
) -> Result<(StatusCode, Json<SessionResponse>), ServerError> {
    state.session.start(config)?;
    Ok((StatusCode::ACCEPTED, Json(session_snapshot(&state.session))))
}

async fn stop_handler(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<SessionResponse>), ServerError> {
    state.session.stop()?;
    Ok((StatusCode::ACCEPTED, Json(session_snapshot(&state.session))))
}

/// Buffered entries, oldest first. `limit` keeps only the newest N.
async fn logs_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LogsQueryParams>,
) -> Json<Vec<LogEntry>> {
    let logs = state.session.logs();
    let entries = match params.limit {
        Some(limit) => logs.tail(limit),
        None => logs.entries(),
    };
    Json(entries)
}

async fn clear_logs_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    state.session.logs().clear();
    StatusCode::NO_CONTENT
}

/// Plain-text export as a download.
async fn export_handler(State(state): State<Arc<AppState>>) -> Response {
    let file_name = export_file_name(chrono::Utc::now());
    let disposition = format!("attachment; filename=\"{file_name}\"");
    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        state.session.logs().export(),
    )
        .into_response()
}
