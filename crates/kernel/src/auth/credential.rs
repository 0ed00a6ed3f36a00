//! Credentials as presented by a caller.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;

/// Header carrying a static API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header naming the principal an API-key request acts for.
pub const USER_ID_HEADER: &str = "user_id";

/// Principal used for API-key sessions that do not name one.
pub const DEFAULT_USER_ID: &str = "user";

/// Whatever the caller sent that might identify it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credential {
    /// Bearer token from `Authorization`.
    pub token: Option<String>,
    pub api_key: Option<String>,
    /// Principal claimed alongside an API key.
    pub user_id: Option<String>,
}

impl Credential {
    /// Extract credentials from request headers. Blank values count as absent.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let token = header(AUTHORIZATION.as_str())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        Self {
            token,
            api_key: header(API_KEY_HEADER).map(str::to_string),
            user_id: header(USER_ID_HEADER).map(str::to_string),
        }
    }

    pub fn api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
            ..Self::default()
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.api_key.is_none()
    }
}
