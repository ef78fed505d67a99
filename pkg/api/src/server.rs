use std::net::SocketAddr;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tracing::info;

use crate::handlers::{health, internal, seats};
use crate::AppState;

/// Serve the replica API until a termination signal arrives.
///
/// The peer-message route exists only in the decentralized variant; the
/// centralized replica has no mutual-exclusion traffic to receive.
pub async fn start_server(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let mut app = Router::new()
        .route("/asientos", get(seats::list_seats))
        .route("/reservar", post(seats::reserve_seat))
        .route("/liberar", post(seats::free_seat))
        .route("/health", get(health::health_check));

    if state.node.is_some() {
        app = app.route("/internal/message", post(internal::peer_message));
    }
    let app = app.with_state(state);

    info!("Starting replica API on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
