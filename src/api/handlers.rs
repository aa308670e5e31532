//! HTTP request handlers

use super::assets::{get_index_html, serve_static};
use super::sse::sse_stream;
use super::types::{
    ApprovalRequest, ErrorResponse, SubmitRequest, ThreadListResponse, ThreadResponse,
};
use super::AppState;
use crate::runtime::{TurnError, TurnOutcome};
use crate::state_machine::TransitionError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Root serves the chat page
        .route("/", get(serve_spa))
        .route("/assets/*path", get(serve_static))
        .route("/api/threads", get(list_threads))
        .route("/api/threads/:id", get(get_thread))
        .route("/api/threads/:id/messages", post(submit_message))
        .route("/api/threads/:id/approval", post(answer_approval))
        .route("/api/threads/:id/stream", get(stream_thread))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Chat page
// ============================================================

async fn serve_spa() -> impl IntoResponse {
    match get_index_html() {
        Some(content) => Html(content).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Html("<h1>404 - chat page not found</h1>".to_string()),
        )
            .into_response(),
    }
}

// ============================================================
// Threads
// ============================================================

async fn list_threads(
    State(state): State<AppState>,
) -> Result<Json<ThreadListResponse>, AppError> {
    let threads = state.controller.threads().await?;
    Ok(Json(ThreadListResponse { threads }))
}

async fn get_thread(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ThreadResponse>, AppError> {
    let conv = state
        .controller
        .conversation(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Thread not found: {id}")))?;

    Ok(Json(ThreadResponse {
        question: conv.pending_question().map(str::to_string),
        turn: conv.turn.label(),
        approval: conv.approval,
        messages: conv.messages().to_vec(),
        thread_id: conv.thread_id,
    }))
}

// ============================================================
// Turns
// ============================================================

async fn submit_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<TurnOutcome>, AppError> {
    if req.text.trim().is_empty() {
        return Err(AppError::BadRequest("Message text is empty".to_string()));
    }
    tracing::info!(thread_id = %id, chars = req.text.len(), "User message received");

    let outcome = state.controller.submit(&id, &req.text).await?;
    Ok(Json(outcome))
}

async fn answer_approval(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ApprovalRequest>,
) -> Result<Json<TurnOutcome>, AppError> {
    let outcome = state.controller.resume(&id, &req.answer).await?;
    Ok(Json(outcome))
}

async fn stream_thread(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    tracing::debug!(thread_id = %id, "SSE client connected");
    sse_stream(state.controller.subscribe(&id))
}

async fn get_version() -> &'static str {
    concat!("scout-chat ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl From<TurnError> for AppError {
    fn from(err: TurnError) -> Self {
        let message = err.to_string();
        match err {
            TurnError::ThreadBusy(_)
            | TurnError::Rejected(
                TransitionError::TurnInProgress
                | TransitionError::ApprovalPending
                | TransitionError::NoApprovalPending,
            ) => AppError::Conflict(message),
            TurnError::Rejected(TransitionError::InvalidTransition(_)) => {
                AppError::BadRequest(message)
            }
            TurnError::Storage(_) => {
                tracing::error!(error = %message, "Checkpoint storage failed");
                AppError::Internal(message)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
