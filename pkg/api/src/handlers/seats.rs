use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::warn;

use pkg_reservation::ReservationError;
use pkg_types::seat::{ActionResponse, FreeRequest, ReserveRequest, SeatListResponse};
use pkg_types::validate::validate_cliente;

use crate::AppState;

/// GET /asientos: full seat snapshot, refreshed from the store.
pub async fn list_seats(State(state): State<AppState>) -> impl IntoResponse {
    match state.service.list().await {
        Ok(asientos) => (
            StatusCode::OK,
            Json(SeatListResponse {
                asientos,
                server_id: state.service.server_id().to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            warn!("Failed to list seats: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to get seats").into_response()
        }
    }
}

/// POST /reservar: reserve a seat for a client.
pub async fn reserve_seat(
    State(state): State<AppState>,
    Json(req): Json<ReserveRequest>,
) -> impl IntoResponse {
    if let Err(e) = validate_cliente(&req.cliente) {
        return action_response(&state, StatusCode::BAD_REQUEST, false, e.to_string());
    }

    match state.service.reserve(req.numero, &req.cliente).await {
        Ok(message) => action_response(&state, StatusCode::OK, true, message),
        Err(e) => action_response(&state, error_status(&e), false, e.to_string()),
    }
}

/// POST /liberar: return a seat to the pool.
pub async fn free_seat(
    State(state): State<AppState>,
    Json(req): Json<FreeRequest>,
) -> impl IntoResponse {
    match state.service.free(req.numero).await {
        Ok(message) => action_response(&state, StatusCode::OK, true, message),
        Err(e) => action_response(&state, error_status(&e), false, e.to_string()),
    }
}

fn error_status(err: &ReservationError) -> StatusCode {
    match err {
        ReservationError::NotFound => StatusCode::NOT_FOUND,
        ReservationError::Conflict(_) | ReservationError::LockDenied(_) => StatusCode::CONFLICT,
        ReservationError::LockUnavailable(_) | ReservationError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn action_response(
    state: &AppState,
    status: StatusCode,
    success: bool,
    message: String,
) -> axum::response::Response {
    (
        status,
        Json(ActionResponse {
            success,
            message,
            server_id: state.service.server_id().to_string(),
        }),
    )
        .into_response()
}
