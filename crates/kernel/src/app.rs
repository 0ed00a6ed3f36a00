//! Router assembly.
//!
//! Core routes are plain axum routes. Every other request, including a core
//! path hit with a method the kernel does not serve, falls through to the
//! dispatcher.

use std::time::Duration;

use axum::Router;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::auth::{API_KEY_HEADER, USER_ID_HEADER};
use crate::config::Config;
use crate::dispatch::http::plugin_fallback;
use crate::routes;
use crate::state::AppState;

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    let cors = build_cors_layer(state.config());
    let timeout = Duration::from_secs(state.config().request_timeout_secs);

    Router::new()
        .merge(routes::core_router())
        .fallback(plugin_fallback)
        .method_not_allowed_fallback(plugin_fallback)
        // Last added = first executed: TraceLayer -> CORS -> timeout -> routes
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];

    if config.cors_allowed_origins.len() == 1 && config.cors_allowed_origins[0] == "*" {
        CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();

        // Credentials cannot be combined with a wildcard header list.
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([
                AUTHORIZATION,
                CONTENT_TYPE,
                HeaderName::from_static(API_KEY_HEADER),
                HeaderName::from_static(USER_ID_HEADER),
            ])
            .allow_credentials(true)
    }
}
