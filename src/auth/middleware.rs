//! Authentication middleware
//!
//! Validates the bearer token and inserts the caller [`Session`] into the
//! request extensions.

use crate::auth::{decode_token, Session};
use crate::error::AppError;
use crate::state::SharedState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

pub async fn auth_middleware(
    State(state): State<SharedState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(Authorization(bearer)) = bearer
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

    let claims = decode_token(bearer.token(), &state.jwt_secret)?;

    request.extensions_mut().insert(Session::from(claims));

    Ok(next.run(request).await)
}
