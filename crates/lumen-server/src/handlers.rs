//! HTTP request handlers for the session API.
//!
//! One route per engine operation, plus a health check.

use crate::registry::{RegistryError, SessionRegistry};
use crate::responses::{
    DetailResponse, OverviewResponse, RefreshResponse, SelectEntityRequest, SelectYearsRequest,
    SelectionResponse, SessionCreated,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router as AxumRouter,
};
use lumen_domain::EntityCode;
use lumen_engine::{EngineError, SessionStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Live sessions
    pub registry: Arc<SessionRegistry>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    /// Overall health status
    pub status: String,
    /// Number of live sessions
    pub sessions: usize,
    /// Number of tracked entities
    pub entities: usize,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// Unknown session id
    SessionNotFound(Uuid),
    /// Malformed request content
    BadRequest(String),
    /// Engine-related error
    EngineError(EngineError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::SessionNotFound(id) => (StatusCode::NOT_FOUND, format!("Session not found: {}", id)),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::EngineError(e @ EngineError::Selection(_)) => (StatusCode::BAD_REQUEST, e.to_string()),
            AppError::EngineError(e) => {
                tracing::error!("Request failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

impl From<RegistryError> for AppError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::SessionNotFound(id) => AppError::SessionNotFound(id),
            RegistryError::Engine(e) => AppError::EngineError(e),
        }
    }
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        AppError::EngineError(e)
    }
}

/// POST /sessions - Start a session
async fn create_session(State(state): State<AppState>) -> Result<(StatusCode, Json<SessionCreated>), AppError> {
    let id = state.registry.create()?;
    Ok((StatusCode::CREATED, Json(SessionCreated { id })))
}

/// DELETE /sessions/:id - End a session
async fn end_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, AppError> {
    state.registry.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /sessions/:id/overview
async fn overview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<OverviewResponse>, AppError> {
    let session = state.registry.get(id)?;
    let (view, version) = session.versioned_overview();
    Ok(Json(OverviewResponse::new(&view, version)))
}

/// GET /sessions/:id/detail
async fn detail(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<DetailResponse>, AppError> {
    let session = state.registry.get(id)?;
    Ok(Json(DetailResponse::from(session.detail().as_ref())))
}

/// POST /sessions/:id/selection/entity
async fn select_entity(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SelectEntityRequest>,
) -> Result<Json<SelectionResponse>, AppError> {
    let session = state.registry.get(id)?;
    let code = EntityCode::new(&request.code).map_err(AppError::BadRequest)?;

    session.select_entity(code);
    Ok(Json(SelectionResponse::from(&session.selection())))
}

/// POST /sessions/:id/selection/years
///
/// Returns 400 and keeps the previous range when the range is inverted.
async fn select_years(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SelectYearsRequest>,
) -> Result<Json<SelectionResponse>, AppError> {
    let session = state.registry.get(id)?;
    session.select_years(request.from, request.to)?;
    Ok(Json(SelectionResponse::from(&session.selection())))
}

/// POST /sessions/:id/refresh - Trigger a refresh outside the schedule
async fn refresh(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<RefreshResponse>, AppError> {
    let session = state.registry.get(id)?;
    Ok(Json(RefreshResponse {
        outcome: session.refresh_now(),
    }))
}

/// GET /sessions/:id/status - Cache freshness and refresh metrics
async fn status(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<SessionStatus>, AppError> {
    let session = state.registry.get(id)?;
    Ok(Json(session.status()))
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    let entities = state.registry.catalog().len();
    let status = if entities == 0 { "degraded" } else { "healthy" };

    Json(HealthCheckResponse {
        status: status.to_string(),
        sessions: state.registry.len(),
        entities,
    })
}

/// Create the axum router with all routes
pub fn create_router(state: AppState) -> AxumRouter {
    AxumRouter::new()
        .route("/sessions", post(create_session))
        .route("/sessions/:id", axum::routing::delete(end_session))
        .route("/sessions/:id/overview", get(overview))
        .route("/sessions/:id/detail", get(detail))
        .route("/sessions/:id/selection/entity", post(select_entity))
        .route("/sessions/:id/selection/years", post(select_years))
        .route("/sessions/:id/refresh", post(refresh))
        .route("/sessions/:id/status", get(status))
        .route("/health", get(health_check))
        .with_state(state)
}
