//! Accounts known to the catalog. Sign-up and sign-in live with the external auth provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A registered account. Only the fields the catalog needs are modelled.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}
