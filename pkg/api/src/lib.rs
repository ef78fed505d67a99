pub mod handlers;
pub mod server;

use std::sync::Arc;

use pkg_mutex::RaNode;
use pkg_reservation::ReservationService;

/// Shared application state injected into all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ReservationService>,
    /// Present only in the decentralized variant.
    pub node: Option<Arc<RaNode>>,
}
