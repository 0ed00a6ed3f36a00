//! Request-time dispatch errors and their HTTP mapping.

use axum::Json;
use axum::http::header::WWW_AUTHENTICATE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use trellis_sdk::{Capability, HttpMethod};

use crate::auth::AuthError;
use crate::validation::ValidationError;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no route for {method} {path}")]
    NotFound { method: HttpMethod, path: String },

    #[error("not authenticated: {0}")]
    Unauthenticated(String),

    #[error("missing capability {0}")]
    Forbidden(Capability),

    /// The body was not JSON at all.
    #[error("malformed JSON body: {0}")]
    MalformedBody(String),

    /// The input did not satisfy the declared schema.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The handler failed, panicked, or returned output violating its schema.
    ///
    /// `detail` is logged and never sent to the caller.
    #[error("handler for {route} failed: {detail}")]
    Handler { route: String, detail: String },
}

impl DispatchError {
    pub fn handler(route: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Handler {
            route: route.into(),
            detail: detail.into(),
        }
    }

    /// Short label for metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            DispatchError::NotFound { .. } => "not_found",
            DispatchError::Unauthenticated(_) => "unauthenticated",
            DispatchError::Forbidden(_) => "forbidden",
            DispatchError::MalformedBody(_) => "bad_request",
            DispatchError::Validation(_) => "validation_error",
            DispatchError::Handler { .. } => "handler_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::NotFound { .. } => StatusCode::NOT_FOUND,
            DispatchError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            DispatchError::Forbidden(_) => StatusCode::FORBIDDEN,
            DispatchError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            DispatchError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DispatchError::Handler { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AuthError> for DispatchError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Unauthenticated(reason) => DispatchError::Unauthenticated(reason),
            AuthError::Forbidden(capability) => DispatchError::Forbidden(capability),
            // Requirements are normalized at enable time; reaching this is a defect.
            AuthError::InvalidRequirement(e) => {
                DispatchError::handler("auth", format!("unresolved requirement: {e}"))
            }
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            DispatchError::NotFound { .. } => json!({"detail": "Not Found"}),
            DispatchError::Validation(e) => json!({"detail": e.errors}),
            DispatchError::Handler { route, detail } => {
                tracing::error!(route = %route, detail = %detail, "handler error");
                json!({"detail": "Internal server error"})
            }
            _ => json!({"detail": self.to_string()}),
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
