//! Application error types for core routes.

use axum::Json;
use axum::http::header::WWW_AUTHENTICATE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthError;
use crate::plugin::PluginError;
use crate::registry::RegistryError;

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Unauthenticated(reason) => AppError::Unauthorized(reason),
            AuthError::Forbidden(_) => AppError::Forbidden(e.to_string()),
            AuthError::InvalidRequirement(_) => AppError::BadRequest(e.to_string()),
        }
    }
}

impl From<PluginError> for AppError {
    fn from(e: PluginError) -> Self {
        match &e {
            PluginError::UnknownPlugin { .. } => AppError::NotFound(e.to_string()),
            PluginError::InvalidId { .. } => AppError::BadRequest(e.to_string()),
            PluginError::AlreadyInstalled { .. }
            | PluginError::NotEnabled { .. }
            | PluginError::Registry(RegistryError::Conflict { .. }) => {
                AppError::Conflict(e.to_string())
            }
            PluginError::Registry(_) | PluginError::DeclarationPanic { .. } => {
                AppError::BadRequest(e.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
        };

        let detail = match &self {
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal server error");
                "internal server error".to_string()
            }
            _ => self.to_string(),
        };

        let mut response = (status, Json(json!({"detail": detail}))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;
