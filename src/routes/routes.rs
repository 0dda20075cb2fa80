//! Defines routes for the TechTube server functions.
//!
//! ## Structure
//! - **Health**
//!   - `GET  /healthz`, `GET /readyz`
//!
//! - **Uploads** (authenticated)
//!   - `POST /api/uploads/signature` — sign a direct-to-provider upload
//!
//! - **Videos**
//!   - `POST /api/videos` — register an uploaded asset (authenticated)
//!   - `GET  /api/videos/recent`, `GET /api/videos/popular` — catalog listings
//!   - `GET  /api/videos/{id}` — single video

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        upload_handlers::generate_upload_signature,
        video_handlers::{create_video, get_video, popular_videos, recent_videos},
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{get, post},
};

/// Build and return the router for all API routes.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/api/uploads/signature", post(generate_upload_signature))
        .route("/api/videos", post(create_video))
        .route("/api/videos/recent", get(recent_videos))
        .route("/api/videos/popular", get(popular_videos))
        .route("/api/videos/{id}", get(get_video))
}
