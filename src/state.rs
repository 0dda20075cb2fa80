use crate::{
    config::MediaConfig,
    services::{
        auth_service::AuthService, signature_service::SignatureService,
        video_service::VideoService,
    },
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub auth: AuthService,
    pub signer: SignatureService,
    pub videos: VideoService,
}

impl AppState {
    pub fn new(db: Arc<SqlitePool>, media: MediaConfig) -> Self {
        Self {
            auth: AuthService::new(db.clone()),
            signer: SignatureService::new(media.clone()),
            videos: VideoService::new(db.clone(), media),
            db,
        }
    }
}
