//! Authenticated-actor extractor.

use crate::{errors::AppError, services::auth_service::AuthError, state::AppState};
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use uuid::Uuid;

/// The account behind a valid `Authorization: Bearer <token>` header.
///
/// Handlers that take this extractor reject unauthenticated calls with 401
/// before their body runs.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub name: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or(AuthError::MissingCredentials)?;

        let user = state.auth.resolve_session(token).await?;
        Ok(AuthUser {
            user_id: user.id,
            name: user.name,
        })
    }
}

/// Token of a `Bearer` credential. The scheme name is case-insensitive.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
