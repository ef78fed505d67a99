use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use pkg_types::message::PeerMessage;

use crate::AppState;

/// POST /internal/message: mutual-exclusion traffic from peer replicas.
///
/// The node witnesses the Lamport timestamp before this handler returns, so
/// a peer observing our 200 knows its send happened-before our next event.
pub async fn peer_message(
    State(state): State<AppState>,
    Json(msg): Json<PeerMessage>,
) -> impl IntoResponse {
    if let Some(ref node) = state.node {
        node.handle_message(msg).await;
    }
    StatusCode::OK
}
