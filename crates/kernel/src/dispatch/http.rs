//! Binding between the axum router and the dispatcher.
//!
//! Core routes are ordinary axum routes; everything else lands in
//! [`plugin_fallback`], which hands the request to the live dispatch table.

use std::collections::HashMap;

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use trellis_sdk::HttpMethod;

use super::DispatchRequest;
use crate::auth::Credential;
use crate::state::AppState;

/// Fallback handler serving every plugin route.
pub async fn plugin_fallback(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
    body: Bytes,
) -> Response {
    let Ok(method) = method.as_str().parse::<HttpMethod>() else {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            Json(serde_json::json!({"detail": "Method Not Allowed"})),
        )
            .into_response();
    };

    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"detail": rejection.body_text()})),
            )
                .into_response();
        }
    };

    let request = DispatchRequest {
        method,
        path: uri.path().to_string(),
        query,
        credential: Credential::from_headers(&headers),
        body,
    };

    match state.dispatcher().dispatch(request).await {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(e) => e.into_response(),
    }
}
