//! API Routes
//!
//! Operational HTTP surface: health, projection reads, and sync controls.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::projection::{ProjectionStore, SyncEngine, SyncStatus, UserProjection};

/// Shared state for the API router
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub projections: ProjectionStore,
    pub sync_engine: Arc<SyncEngine>,
}

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
}

#[derive(Debug, Deserialize)]
pub struct UsersQuery {
    pub status: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct UsersListResponse {
    pub users: Vec<UserProjection>,
}

#[derive(Debug, Serialize)]
pub struct SyncRunResponse {
    pub applied: u64,
    pub skipped: u64,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        // Projection reads
        .route("/users/:user_id", get(get_user))
        .route("/users", get(list_users))
        // Sync controls
        .route("/sync/status", get(sync_status))
        .route("/sync/run", post(sync_run))
        .route("/sync/rebuild", post(sync_rebuild))
}

/// Health check, including database reachability
async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    crate::db::verify_connection(&state.pool).await?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        database: "reachable".to_string(),
    }))
}

/// Get a user's projection row
async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserProjection>, AppError> {
    let projection = state
        .projections
        .get(user_id)
        .await?
        .ok_or_else(|| AppError::UserNotFound(user_id.to_string()))?;

    Ok(Json(projection))
}

/// List non-deleted users by status
async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UsersQuery>,
) -> Result<Json<UsersListResponse>, AppError> {
    if query.limit <= 0 || query.limit > 500 {
        return Err(AppError::InvalidRequest(
            "limit must be between 1 and 500".to_string(),
        ));
    }

    let users = state
        .projections
        .find_by_status(&query.status, query.limit, query.offset)
        .await?;

    Ok(Json(UsersListResponse { users }))
}

/// Current sync checkpoint and run state
async fn sync_status(State(state): State<AppState>) -> Result<Json<SyncStatus>, AppError> {
    let status = state.sync_engine.status().await?;
    Ok(Json(status))
}

/// Trigger a catch-up run now
async fn sync_run(State(state): State<AppState>) -> Result<Json<SyncRunResponse>, AppError> {
    let report = state.sync_engine.catch_up().await?;
    Ok(Json(SyncRunResponse {
        applied: report.applied,
        skipped: report.skipped,
    }))
}

/// Rebuild the projection from scratch
async fn sync_rebuild(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SyncRunResponse>), AppError> {
    let report = state.sync_engine.rebuild().await?;
    Ok((
        StatusCode::OK,
        Json(SyncRunResponse {
            applied: report.applied,
            skipped: report.skipped,
        }),
    ))
}
