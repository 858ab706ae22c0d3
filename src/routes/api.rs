use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::handlers::{api, inference, upload};
use crate::state::AppState;
use std::sync::Arc;

/// Create the REST API router
///
/// Upload bodies are capped at `upload_max_bytes`; other routes keep axum's
/// default limit.
pub fn create_api_router(config: &ServerConfig) -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/credentials", get(api::get_credentials))
        .route(
            "/api/upload",
            post(upload::upload_to_s3).layer(DefaultBodyLimit::max(config.upload_max_bytes)),
        )
        .route("/api/transcribe", post(inference::transcribe_audio))
        .route("/api/bedrock", post(inference::bedrock_inference))
        .route("/api/sessions", get(api::list_sessions))
        .layer(TraceLayer::new_for_http())
}
