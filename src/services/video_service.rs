//! VideoService — registers provider-confirmed uploads in the catalog and
//! serves the catalog reads.

use crate::{
    config::MediaConfig,
    models::video::{Video, VideoStatus},
    services::media_urls,
};
use chrono::Utc;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

const TITLE_MIN_LEN: usize = 3;
const TITLE_MAX_LEN: usize = 100;
const DESCRIPTION_MAX_LEN: usize = 500;

const VIDEO_COLUMNS: &str = "id, title, description, video_url, thumbnail_url, cloudinary_id, \
     duration, view_count, status, user_id, created_at, updated_at";

#[derive(Debug, Error)]
pub enum VideoError {
    #[error("{0}")]
    Validation(String),
    #[error("video `{0}` not found")]
    NotFound(Uuid),
    #[error("storage provider configuration is incomplete: missing cloud name")]
    Configuration,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type VideoResult<T> = Result<T, VideoError>;

/// Input of the create-video endpoint, sent once the provider has returned an asset id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVideo {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(alias = "cloudinaryId", alias = "asset_id")]
    pub asset_id: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Clone)]
pub struct VideoService {
    pub db: Arc<SqlitePool>,
    media: MediaConfig,
}

impl VideoService {
    pub fn new(db: Arc<SqlitePool>, media: MediaConfig) -> Self {
        Self { db, media }
    }

    /// Persist a published video owned by `owner`.
    ///
    /// Playback URL is derived from the asset id; the thumbnail URL too unless
    /// the caller supplied one.
    pub async fn create_video(&self, owner: Uuid, input: NewVideo) -> VideoResult<Video> {
        let input = validate(input)?;
        let cloud_name = self
            .media
            .cloud_name
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or(VideoError::Configuration)?;

        let video_url = media_urls::video_url(&self.media.cdn_host, cloud_name, &input.asset_id);
        let thumbnail_url = input.thumbnail_url.clone().unwrap_or_else(|| {
            media_urls::thumbnail_url(&self.media.cdn_host, cloud_name, &input.asset_id)
        });
        let now = Utc::now();

        let video = sqlx::query_as::<_, Video>(&format!(
            "INSERT INTO videos ({VIDEO_COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?) \
             RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&input.title)
        .bind(&input.description)
        .bind(&video_url)
        .bind(&thumbnail_url)
        .bind(&input.asset_id)
        .bind(input.duration)
        .bind(VideoStatus::Published.as_str())
        .bind(owner)
        .bind(now)
        .bind(now)
        .fetch_one(&*self.db)
        .await?;

        tracing::info!(video_id = %video.id, asset_id = %input.asset_id, "video created");
        Ok(video)
    }

    pub async fn get_video(&self, id: Uuid) -> VideoResult<Video> {
        sqlx::query_as::<_, Video>(&format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = ?"))
            .bind(id)
            .fetch_optional(&*self.db)
            .await?
            .ok_or(VideoError::NotFound(id))
    }

    /// Newest first.
    pub async fn recent_videos(&self, limit: i64) -> VideoResult<Vec<Video>> {
        let rows = sqlx::query_as::<_, Video>(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos ORDER BY created_at DESC, rowid DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    /// Most viewed first.
    pub async fn popular_videos(&self, limit: i64) -> VideoResult<Vec<Video>> {
        let rows = sqlx::query_as::<_, Video>(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos ORDER BY view_count DESC, created_at DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }
}

/// Check bounds and normalise optional fields (blank strings become `None`).
/// The title is stored as sent; its length counts every character.
fn validate(mut input: NewVideo) -> VideoResult<NewVideo> {
    let title_len = input.title.chars().count();
    if !(TITLE_MIN_LEN..=TITLE_MAX_LEN).contains(&title_len) {
        return Err(VideoError::Validation(format!(
            "title must be between {} and {} characters",
            TITLE_MIN_LEN, TITLE_MAX_LEN
        )));
    }

    input.description = input.description.filter(|d| !d.trim().is_empty());
    if let Some(desc) = &input.description {
        if desc.chars().count() > DESCRIPTION_MAX_LEN {
            return Err(VideoError::Validation(format!(
                "description must be at most {} characters",
                DESCRIPTION_MAX_LEN
            )));
        }
    }

    input.asset_id = input.asset_id.trim().to_string();
    if input.asset_id.is_empty() {
        return Err(VideoError::Validation("asset id is required".into()));
    }

    input.thumbnail_url = input.thumbnail_url.filter(|u| !u.trim().is_empty());
    if let Some(url) = &input.thumbnail_url {
        match Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => {
                return Err(VideoError::Validation(format!(
                    "thumbnail url `{}` is not a valid http(s) URL",
                    url
                )));
            }
        }
    }

    if let Some(duration) = input.duration {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(VideoError::Validation("duration must be positive".into()));
        }
    }

    Ok(input)
}
