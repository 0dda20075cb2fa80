//! Represents a video in the catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A catalog entry pointing at an asset held by the storage provider.
///
/// The row is only written once the provider has confirmed the upload, so
/// `cloudinary_id` always names a complete asset.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: Uuid,

    pub title: String,

    pub description: Option<String>,

    /// Playback URL on the provider CDN.
    pub video_url: String,

    pub thumbnail_url: Option<String>,

    /// Provider asset identifier (`public_id`).
    pub cloudinary_id: Option<String>,

    /// Length in seconds, when known.
    pub duration: Option<f64>,

    pub view_count: i64,

    /// One of [`VideoStatus`], stored as text.
    pub status: String,

    /// Owner; always the authenticated actor that created the row.
    pub user_id: Uuid,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Publication state of a video. Rows created through the upload path are
/// always published; there is no draft workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Published,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Published => "published",
        }
    }
}
