//! Token issuance.
//!
//! `POST /auth/token` exchanges a configured username and password for a
//! bearer token carrying that user's grants.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{debug, info};

use crate::auth::IssuedToken;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Token request body.
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

async fn issue_token(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> AppResult<Json<IssuedToken>> {
    let username = request.username.clone();

    // Argon2 verification is deliberately slow; keep it off the runtime.
    let check_state = state.clone();
    let grants = tokio::task::spawn_blocking(move || {
        check_state
            .identity()
            .authenticate_user(&request.username, &request.password)
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("password check task failed: {e}")))?;

    let Some(grants) = grants else {
        debug!(user = %username, "token request rejected");
        return Err(AppError::Unauthorized("invalid username or password".to_string()));
    };

    let codec = state
        .identity()
        .codec()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("token signing is not configured")))?;
    let token = codec
        .issue(&username, grants)
        .map_err(|e| AppError::Internal(e.into()))?;

    info!(user = %username, "token issued");
    Ok(Json(token))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/auth/token", post(issue_token))
}
