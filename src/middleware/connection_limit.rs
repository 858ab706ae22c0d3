//! Global and per-IP caps on relay WebSocket connections.
//!
//! Upgrade requests that fit under both caps get a [`ConnectionSlot`] in
//! their extensions. The slot is released when the last handle to it drops,
//! so a session keeps its slot for as long as the handler holds it.

use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::warn;

use crate::state::{AppState, ConnectionLimitError};

/// A reserved connection slot. Dropping it gives the slot back.
pub struct ConnectionSlot {
    state: Arc<AppState>,
    ip: IpAddr,
}

impl ConnectionSlot {
    pub fn ip(&self) -> IpAddr {
        self.ip
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.state.release_connection(self.ip);
    }
}

impl std::fmt::Debug for ConnectionSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSlot").field("ip", &self.ip).finish()
    }
}

impl IntoResponse for ConnectionLimitError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ConnectionLimitError::GlobalLimitReached => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Server at capacity. Please try again later.",
            ),
            ConnectionLimitError::PerIpLimitReached => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many connections from your IP address.",
            ),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

fn is_websocket_upgrade(request: &Request<Body>) -> bool {
    request
        .headers()
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

/// Reserve a [`ConnectionSlot`] for WebSocket upgrades.
///
/// Returns 503 when the global cap is reached and 429 when the client's IP
/// is at its cap. Plain HTTP requests pass through untouched.
pub async fn connection_limit_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if !is_websocket_upgrade(&request) {
        return next.run(request).await;
    }

    let ip = addr.ip();
    if let Err(rejection) = state.try_acquire_connection(ip) {
        warn!(ip = %ip, reason = ?rejection, "Rejecting WebSocket connection");
        return rejection.into_response();
    }

    request
        .extensions_mut()
        .insert(Arc::new(ConnectionSlot { state, ip }));
    next.run(request).await
}
