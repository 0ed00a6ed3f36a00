//! Documentation routes: OpenAPI document and the grouped endpoint list.
//!
//! Both render the live dispatch table, so they change as plugins are
//! enabled and disabled.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;

use crate::docs::{EndpointIndex, endpoint_index, openapi};
use crate::state::AppState;

/// GET /openapi.json
async fn openapi_document(State(state): State<AppState>) -> Json<Value> {
    let table = state.registry().snapshot();
    Json(openapi(&table, env!("CARGO_PKG_VERSION")))
}

/// GET /endpoints
async fn endpoints(State(state): State<AppState>) -> Json<EndpointIndex> {
    Json(endpoint_index(&state.registry().snapshot()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/openapi.json", get(openapi_document))
        .route("/endpoints", get(endpoints))
}
