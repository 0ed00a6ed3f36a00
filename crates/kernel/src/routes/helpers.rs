//! Shared route helpers.

use axum::http::HeaderMap;
use tracing::debug;
use trellis_sdk::{AuthPermission, AuthResource, Capability, SessionContext};

use crate::auth::Credential;
use crate::error::AppError;
use crate::state::AppState;

/// Require the caller to hold `(resource, permission)`.
///
/// Core routes go through the same resolver as plugin routes, so a key or
/// token behaves identically on both.
pub async fn require_capability(
    state: &AppState,
    headers: &HeaderMap,
    resource: AuthResource,
    permission: AuthPermission,
) -> Result<SessionContext, AppError> {
    let required = Capability::new(resource, permission);
    let credential = Credential::from_headers(headers);

    state
        .resolver()
        .resolve(&credential, Some(&required))
        .await
        .map_err(|e| {
            debug!(error = %e, capability = %required, "core route denied");
            AppError::from(e)
        })
}
