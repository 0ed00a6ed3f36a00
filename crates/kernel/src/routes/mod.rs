//! HTTP route handlers for kernel-owned routes.
//!
//! Anything not matched here falls through to
//! [`plugin_fallback`](crate::dispatch::http::plugin_fallback).

pub mod auth;
pub mod docs;
pub mod health;
pub mod helpers;
pub mod metrics;
pub mod plugin_admin;

use axum::Router;

use crate::state::AppState;

/// Every core route, merged into one router.
///
/// Must stay in step with [`CORE_ROUTES`](crate::state::CORE_ROUTES), which
/// reserves these paths against plugin registration.
pub fn core_router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(metrics::router())
        .merge(docs::router())
        .merge(auth::router())
        .merge(plugin_admin::router())
}
