//! Authentication route handlers

use crate::auth::{create_token, Session, SessionToken};
use crate::error::AppError;
use crate::state::SharedState;
use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub user: Session,
    pub token: SessionToken,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub success: bool,
    pub user: Session,
}

/// POST /api/auth/login
///
/// Authenticate with username and password, receive a bearer token.
pub async fn login(
    State(state): State<SharedState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let session = state
        .authenticator
        .authenticate(&req.username, &req.password)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid username or password".to_string()))?;

    let token = create_token(&session, &state.jwt_secret, state.token_ttl_minutes)?;

    Ok(Json(AuthResponse {
        success: true,
        user: session,
        token,
    }))
}

/// GET /api/auth/me
pub async fn me(Extension(session): Extension<Session>) -> Json<MeResponse> {
    Json(MeResponse {
        success: true,
        user: session,
    })
}
