//! `techtube upload <file>`: signature -> chunked upload -> catalog entry.

use crate::{
    client::{api_client::ApiClient, cloudinary::CloudinaryTransport},
    config::{AppConfig, UploadArgs},
    services::{
        chunked_uploader::{
            ChunkPolicy, ChunkedUploader, UploadEvent, UploadOptions, UploadOutcome, UploadSource,
            UploadState,
        },
        video_service::NewVideo,
    },
};
use anyhow::{Context, Result};
use std::env;
use tokio::sync::mpsc;

pub async fn run_upload(cfg: &AppConfig, args: UploadArgs) -> Result<()> {
    let server = args
        .server
        .or_else(|| env::var("TECHTUBE_SERVER_URL").ok())
        .unwrap_or_else(|| format!("http://127.0.0.1:{}", cfg.port));
    let token = args
        .token
        .or_else(|| env::var("TECHTUBE_SESSION_TOKEN").ok())
        .context("Missing session token. Pass --token or set TECHTUBE_SESSION_TOKEN")?;

    let source = UploadSource::Path(args.file.clone());
    let size = source
        .size()
        .await
        .with_context(|| format!("reading {}", args.file.display()))?;
    let policy = ChunkPolicy::from_media(&cfg.media);
    let chunk_size = policy.chunk_size_for(size);
    tracing::info!(
        "Uploading {} ({} bytes, chunked: {})",
        args.file.display(),
        size,
        policy.requires_chunking(size)
    );

    let api = ApiClient::new(&server, token)?;
    let transport = CloudinaryTransport::new(cfg.media.upload_host.clone())?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let uploader = ChunkedUploader::new(&api, transport, chunk_size)
        .with_options(UploadOptions {
            folder: Some(args.folder.clone()).filter(|f| !f.is_empty()),
            ..UploadOptions::default()
        })
        .with_events(tx);

    let cancel = uploader.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let reporter = tokio::spawn(async move {
        let mut state = UploadState::Idle;
        while let Some(event) = rx.recv().await {
            match event {
                UploadEvent::State(next) => {
                    tracing::debug!("upload state {:?} -> {:?}", state, next);
                    state = next;
                }
                UploadEvent::Progress(pct) => tracing::info!("Upload progress: {}%", pct),
            }
        }
        state
    });

    let outcome = uploader.upload(&source).await;
    drop(uploader);
    let final_state = reporter.await.unwrap_or(UploadState::Failed);
    tracing::debug!("upload finished in state {:?}", final_state);

    let asset = match outcome.context("Upload failed")? {
        UploadOutcome::Completed(asset) => asset,
        UploadOutcome::Cancelled => {
            tracing::info!("Upload cancelled; nothing was registered");
            return Ok(());
        }
    };

    tracing::info!(
        "Provider stored {} ({} bytes, format {})",
        asset.public_id,
        asset.bytes.unwrap_or(size),
        asset.format.as_deref().unwrap_or("unknown")
    );

    let video = api
        .create_video(&NewVideo {
            title: args.title,
            description: args.description,
            asset_id: asset.public_id.clone(),
            thumbnail_url: asset.thumbnail_url.clone(),
            duration: asset.duration.map(f64::ceil),
        })
        .await?;

    tracing::info!(
        "Created video {} ({}) -> {}",
        video.id,
        video.title,
        video.video_url
    );
    println!("{}", serde_json::to_string_pretty(&video)?);
    Ok(())
}
