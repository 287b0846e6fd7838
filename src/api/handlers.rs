//! HTTP request handlers

use super::types::{
    CapabilitiesResponse, ChatRequest, ChatResponse, CreateSessionResponse, ErrorResponse,
    SessionResponse,
};
use super::AppState;
use crate::runtime::TurnError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/capabilities", get(list_capabilities))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:key", get(get_session))
        .route("/api/sessions/:key/chat", post(send_chat))
        .route("/version", get(get_version))
        .with_state(state)
}

async fn list_capabilities(State(state): State<AppState>) -> Json<CapabilitiesResponse> {
    Json(CapabilitiesResponse {
        capabilities: state.orchestrator.capabilities().await,
    })
}

async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), AppError> {
    let key = state.orchestrator.create_session().await?;
    Ok((StatusCode::CREATED, Json(CreateSessionResponse { key })))
}

async fn get_session(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state
        .orchestrator
        .session(&key)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Session not found: {key}")))?;
    Ok(Json(SessionResponse {
        key,
        messages: session.messages.iter().cloned().collect(),
    }))
}

async fn send_chat(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if req.message.trim().is_empty() {
        return Err(AppError::BadRequest("message must not be empty".to_string()));
    }
    let response = state.orchestrator.chat(&key, &req.message).await?;
    Ok(Json(ChatResponse { response }))
}

async fn get_version() -> &'static str {
    concat!("research-assistant ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    GatewayTimeout(String),
    Internal(String),
}

impl From<TurnError> for AppError {
    fn from(e: TurnError) -> Self {
        let message = e.to_string();
        match e {
            TurnError::Timeout(_) => AppError::GatewayTimeout(message),
            _ => AppError::Internal(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::GatewayTimeout(msg) => (StatusCode::GATEWAY_TIMEOUT, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
