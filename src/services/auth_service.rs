//! Resolves bearer tokens issued by the external auth provider to an account.

use crate::models::user::User;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication required")]
    MissingCredentials,
    #[error("session is invalid or expired")]
    InvalidSession,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct AuthService {
    db: Arc<SqlitePool>,
}

impl AuthService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Look up the session for `token` and return its owner.
    pub async fn resolve_session(&self, token: &str) -> Result<User, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let session = sqlx::query_as::<_, (Uuid, DateTime<Utc>)>(
            "SELECT user_id, expires_at FROM sessions WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&*self.db)
        .await?;

        let Some((user_id, expires_at)) = session else {
            return Err(AuthError::InvalidSession);
        };
        if expires_at <= Utc::now() {
            tracing::debug!(%user_id, "rejected expired session");
            return Err(AuthError::InvalidSession);
        }

        sqlx::query_as::<_, User>("SELECT id, name, email, created_at FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&*self.db)
            .await?
            .ok_or(AuthError::InvalidSession)
    }
}
