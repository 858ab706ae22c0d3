//! WebSocket relay route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::ws::ws_relay_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the WebSocket relay router
///
/// # Endpoints
///
/// - `GET /ws/{client_id}` - relay session keyed by the client's id
/// - `GET /ws` - relay session with a generated id
///
/// The first client frame must be a credential JSON text frame; binary PCM
/// frames follow. Transcript text is sent back as text frames.
///
/// Connection limits are layered on in [`super::create_app_router`].
pub fn create_ws_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws", get(ws_relay_handler))
        .route("/ws/{client_id}", get(ws_relay_handler))
        .layer(TraceLayer::new_for_http())
}
