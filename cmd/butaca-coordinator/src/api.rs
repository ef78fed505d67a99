use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use tracing::warn;

use pkg_locks::LockCoordinator;
use pkg_types::lease::{LockRequest, ReleaseRequest};

#[derive(Clone)]
pub struct CoordinatorState {
    pub coordinator: Arc<LockCoordinator>,
}

pub fn router(state: CoordinatorState) -> Router {
    Router::new()
        .route("/acquire", post(acquire_lock))
        .route("/release", post(release_lock))
        .route("/renew", post(renew_lock))
        .route("/status/{resource}", get(lock_status))
        .route("/health", get(health_check))
        .with_state(state)
}

/// POST /acquire: try to take a lease on a resource.
async fn acquire_lock(
    State(state): State<CoordinatorState>,
    Json(req): Json<LockRequest>,
) -> impl IntoResponse {
    match state
        .coordinator
        .acquire(&req.resource, &req.client_id, req.ttl)
        .await
    {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(e) => {
            warn!("Acquire on {} failed: {}", req.resource, e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// POST /release: give a held lease back.
async fn release_lock(
    State(state): State<CoordinatorState>,
    Json(req): Json<ReleaseRequest>,
) -> impl IntoResponse {
    let resp = state
        .coordinator
        .release(&req.resource, &req.client_id)
        .await;
    (StatusCode::OK, Json(resp)).into_response()
}

/// POST /renew: extend a held lease before it expires.
async fn renew_lock(
    State(state): State<CoordinatorState>,
    Json(req): Json<LockRequest>,
) -> impl IntoResponse {
    match state
        .coordinator
        .renew(&req.resource, &req.client_id, req.ttl)
        .await
    {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(e) => {
            warn!("Renew on {} failed: {}", req.resource, e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// GET /status/{resource}: current lock state of one resource.
async fn lock_status(
    State(state): State<CoordinatorState>,
    Path(resource): Path<String>,
) -> impl IntoResponse {
    Json(state.coordinator.status(&resource).await)
}

/// GET /health: liveness.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "time": Utc::now().to_rfc3339(),
    }))
}
