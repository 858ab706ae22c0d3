//! Full application router: health, REST API and the relay socket, wrapped
//! in CORS, rate limiting and security headers.

use std::sync::Arc;

use axum::{Router, middleware, routing::get};
use http::{HeaderName, HeaderValue, Method, header};
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;

use crate::errors::{AppError, AppResult};
use crate::handlers;
use crate::middleware::connection_limit_middleware;
use crate::state::AppState;

/// Rates at or above this disable the limiter.
pub const RATE_LIMIT_DISABLED_AT: u32 = 100_000;

const CORS_METHODS: [Method; 3] = [Method::GET, Method::POST, Method::OPTIONS];
const CORS_HEADERS: [HeaderName; 1] = [header::CONTENT_TYPE];

/// CORS policy from `CORS_ALLOWED_ORIGINS`: `*`, a comma-separated list, or
/// unset for same-origin only.
pub fn build_cors_layer(origins: Option<&str>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods(CORS_METHODS)
        .allow_headers(CORS_HEADERS);

    match origins {
        Some("*") => base.allow_origin(Any),
        Some(list) => {
            let origins: Vec<HeaderValue> = list
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            base.allow_origin(origins).allow_credentials(true)
        }
        None => {
            info!("CORS_ALLOWED_ORIGINS not set, cross-origin requests are refused");
            base
        }
    }
}

/// Assemble the router served by the binary.
///
/// Connection limits wrap only the `/ws` routes.
pub fn create_app_router(state: Arc<AppState>) -> AppResult<Router> {
    let config = &state.config;

    let governor_layer = if config.rate_limit_requests_per_second < RATE_LIMIT_DISABLED_AT {
        let governor_config = GovernorConfigBuilder::default()
            .per_second(config.rate_limit_requests_per_second as u64)
            .burst_size(config.rate_limit_burst_size)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| AppError::Internal("Invalid rate limiter settings".to_string()))?;
        Some(GovernorLayer::new(governor_config))
    } else {
        info!("Rate limiting disabled");
        None
    };

    let ws_routes = super::ws::create_ws_router().layer(middleware::from_fn_with_state(
        state.clone(),
        connection_limit_middleware,
    ));

    let security_headers = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ));

    let cors = build_cors_layer(config.cors_allowed_origins.as_deref());

    Ok(Router::new()
        .route("/", get(handlers::health_check))
        .merge(super::api::create_api_router(config))
        .merge(ws_routes)
        .with_state(state)
        .layer(cors)
        .layer(tower::util::option_layer(governor_layer))
        .layer(security_headers))
}
