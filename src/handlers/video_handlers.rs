//! HTTP handlers for the video catalog.

use crate::{
    errors::AppError,
    handlers::auth::AuthUser,
    models::video::Video,
    services::video_service::NewVideo,
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

const DEFAULT_LIST_LIMIT: i64 = 20;
const MAX_LIST_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

impl ListQuery {
    fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT)
    }
}

/// `POST /api/videos` — register an uploaded asset. The owner is the caller.
pub async fn create_video(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<NewVideo>,
) -> Result<(StatusCode, Json<Video>), AppError> {
    let video = state.videos.create_video(user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(video)))
}

/// `GET /api/videos/{id}`
pub async fn get_video(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Video>, AppError> {
    Ok(Json(state.videos.get_video(id).await?))
}

/// `GET /api/videos/recent?limit=`
pub async fn recent_videos(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<Video>>, AppError> {
    Ok(Json(state.videos.recent_videos(q.limit()).await?))
}

/// `GET /api/videos/popular?limit=`
pub async fn popular_videos(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<Video>>, AppError> {
    Ok(Json(state.videos.popular_videos(q.limit()).await?))
}
