use axum::{extract::State, response::IntoResponse, Json};
use chrono::Utc;

use crate::AppState;

/// GET /health: liveness plus a cheap view of the cached inventory size.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "server_id": state.service.server_id(),
        "time": Utc::now().to_rfc3339(),
        "seats_count": state.service.seats_cached().await,
    }))
}
