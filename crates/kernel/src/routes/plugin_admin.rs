//! Plugin management routes.
//!
//! Listing needs `PLUGINS:LIST`; enable, disable and reload need
//! `PLUGINS:EDIT`. Every mutation goes through the plugin host, so a
//! rejected declaration leaves the live routes untouched.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::info;
use trellis_sdk::{AuthPermission, AuthResource};

use crate::error::{AppError, AppResult};
use crate::plugin::{PluginStatus, is_valid_plugin_id};
use crate::state::AppState;

use super::helpers::require_capability;

/// Result of a lifecycle action.
#[derive(Debug, Serialize)]
struct LifecycleResponse {
    plugin: String,
    action: &'static str,
    enabled: bool,
    routes: usize,
    generation: u64,
}

#[derive(Clone, Copy)]
enum Action {
    Enable,
    Disable,
    Reload,
}

impl Action {
    fn as_str(self) -> &'static str {
        match self {
            Action::Enable => "enable",
            Action::Disable => "disable",
            Action::Reload => "reload",
        }
    }
}

/// GET /plugins
async fn list_plugins(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<PluginStatus>>> {
    require_capability(&state, &headers, AuthResource::Plugins, AuthPermission::List).await?;
    Ok(Json(state.plugins().list()))
}

/// POST /plugins/{id}/enable
async fn enable_plugin(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> AppResult<Json<LifecycleResponse>> {
    apply(&state, &headers, &id, Action::Enable).await
}

/// POST /plugins/{id}/disable
async fn disable_plugin(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> AppResult<Json<LifecycleResponse>> {
    apply(&state, &headers, &id, Action::Disable).await
}

/// POST /plugins/{id}/reload
async fn reload_plugin(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> AppResult<Json<LifecycleResponse>> {
    apply(&state, &headers, &id, Action::Reload).await
}

async fn apply(
    state: &AppState,
    headers: &HeaderMap,
    id: &str,
    action: Action,
) -> AppResult<Json<LifecycleResponse>> {
    let session =
        require_capability(state, headers, AuthResource::Plugins, AuthPermission::Edit).await?;

    if !is_valid_plugin_id(id) {
        return Err(AppError::BadRequest(format!("invalid plugin id '{id}'")));
    }

    let routes = match action {
        Action::Enable => state.enable_plugin(id)?,
        Action::Disable => state.disable_plugin(id)?,
        Action::Reload => state.reload_plugin(id)?,
    };

    info!(
        plugin = %id,
        action = action.as_str(),
        user = %session.user_id,
        routes,
        "plugin lifecycle change"
    );

    Ok(Json(LifecycleResponse {
        plugin: id.to_string(),
        action: action.as_str(),
        enabled: state.plugins().is_enabled(id),
        routes,
        generation: state.registry().snapshot().generation(),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/plugins", get(list_plugins))
        .route("/plugins/{id}/enable", post(enable_plugin))
        .route("/plugins/{id}/disable", post(disable_plugin))
        .route("/plugins/{id}/reload", post(reload_plugin))
}
