use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use termgate_terminal::{CreateSessionOptions, SessionId, StreamChunk, TerminalManager};

use crate::web::protocol::{
    AckResponse, CreateSessionResponse, ResizeRequest, StreamParams, WriteRequest,
    SESSION_TOKEN_HEADER,
};

/// Application state shared across routes
#[derive(Clone)]
pub struct AppState {
    pub terminal: Arc<TerminalManager>,
}

/// Create router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", delete(close_session))
        .route("/api/sessions/:id/stream", get(read_stream))
        .route("/api/sessions/:id/input", post(write_input))
        .route("/api/sessions/:id/resize", post(resize_session))
        .with_state(state)
}

/// POST /api/sessions - Spawn a new PTY session
///
/// The only unauthenticated call; its response issues the session's token.
async fn create_session(
    State(state): State<AppState>,
    Json(options): Json<CreateSessionOptions>,
) -> Result<Json<CreateSessionResponse>, AppError> {
    let created = state.terminal.create_session(options)?;

    Ok(Json(CreateSessionResponse {
        session_id: created.session_id,
        access_token: created.access_token,
        next_seq: created.next_seq,
        events: created.events,
        cwd: created.cwd.display().to_string(),
        shell: created.shell,
    }))
}

/// GET /api/sessions/:id/stream?since=N&wait_ms=M - Read buffered output
///
/// With `wait_ms > 0` the request suspends until new output arrives, the
/// session closes, or the wait elapses; the response shape is identical
/// either way.
async fn read_stream(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    Query(params): Query<StreamParams>,
    headers: HeaderMap,
) -> Result<Json<StreamChunk>, AppError> {
    authorize(&state, id, &headers)?;

    let wait = params.wait();
    let chunk = if wait.is_zero() {
        state.terminal.read_stream(id, params.since)
    } else {
        state
            .terminal
            .read_stream_long_poll(id, params.since, wait)
            .await
    };

    chunk
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Session not found".into()))
}

/// POST /api/sessions/:id/input - Send keystrokes to the process
async fn write_input(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    headers: HeaderMap,
    Json(request): Json<WriteRequest>,
) -> Result<Json<AckResponse>, AppError> {
    authorize(&state, id, &headers)?;

    Ok(Json(AckResponse {
        success: state.terminal.write_input(id, &request.data),
    }))
}

/// POST /api/sessions/:id/resize - Apply a new terminal geometry
async fn resize_session(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    headers: HeaderMap,
    Json(request): Json<ResizeRequest>,
) -> Result<Json<AckResponse>, AppError> {
    authorize(&state, id, &headers)?;

    Ok(Json(AckResponse {
        success: state.terminal.resize(id, request.cols, request.rows),
    }))
}

/// DELETE /api/sessions/:id - Kill the process and evict the session
async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    headers: HeaderMap,
) -> Result<Json<AckResponse>, AppError> {
    authorize(&state, id, &headers)?;

    Ok(Json(AckResponse {
        success: state.terminal.close_session(id),
    }))
}

/// Check the session token from the request headers. Unknown sessions are
/// reported before token validity so clients can tell a swept session from
/// a bad token.
fn authorize(state: &AppState, id: SessionId, headers: &HeaderMap) -> Result<(), AppError> {
    let session = state
        .terminal
        .get_session(id)
        .ok_or_else(|| AppError::NotFound("Session not found".into()))?;

    let token = headers
        .get(SESSION_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if !session.token_matches(token) {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

/// Error handling
#[derive(Debug)]
pub enum AppError {
    Anyhow(anyhow::Error),
    NotFound(String),
    Unauthorized,
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Anyhow(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Anyhow(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Invalid or missing session token".to_string(),
            ),
        };

        let body = Json(serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
