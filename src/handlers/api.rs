use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::info;

use crate::core::session::SessionSnapshot;
use crate::errors::AppResult;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub engine: &'static str,
    pub active_sessions: usize,
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "OK".to_string(),
        engine: state.engine.provider_info(),
        active_sessions: state.sessions.len(),
    })
}

/// Temporary instance credentials, in the field names the AWS browser SDK expects.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsResponse {
    pub role: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expiration: OffsetDateTime,
}

/// Return the instance role's temporary credentials from the cache.
pub async fn get_credentials(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<CredentialsResponse>> {
    let credentials = state.instance_credentials.get().await?;
    info!(role = %credentials.role, "Serving temporary instance credentials");

    Ok(Json(CredentialsResponse {
        role: credentials.role,
        region: credentials.region,
        access_key_id: credentials.access_key_id,
        secret_access_key: credentials.secret_access_key,
        session_token: credentials.session_token,
        expiration: credentials.expiration,
    }))
}

#[derive(Serialize)]
pub struct SessionsResponse {
    pub count: usize,
    pub sessions: Vec<SessionSnapshot>,
}

/// List active streaming sessions.
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<SessionsResponse> {
    let sessions = state.sessions.snapshot();
    Json(SessionsResponse {
        count: sessions.len(),
        sessions,
    })
}
