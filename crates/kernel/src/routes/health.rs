//! Health check endpoint.
//!
//! Always 200 while the process is serving; reports the size of the live
//! dispatch table so a probe can spot an empty deployment.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    routes: usize,
    plugins_enabled: usize,
    generation: u64,
}

/// Health check handler.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let table = state.registry().snapshot();

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
            routes: table.len(),
            plugins_enabled: state.plugins().enabled_count(),
            generation: table.generation(),
        }),
    )
}

/// Create the health check router.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
