//! Client for the TechTube server functions used by the upload command.

use crate::{
    models::video::Video,
    services::{
        chunked_uploader::{SignatureSource, UploadError},
        signature_service::{SignatureRequest, UploadSignature},
        video_service::NewVideo,
    },
};
use anyhow::{Context, Result};
use reqwest::{Client, Response};
use std::time::Duration;

pub struct ApiClient {
    client: Client,
    base_url: String,
    auth_token: String,
}

impl ApiClient {
    pub fn new(base_url: &str, auth_token: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
        })
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `POST /api/uploads/signature`
    pub async fn upload_signature(&self, req: &SignatureRequest) -> Result<UploadSignature> {
        let response = self
            .client
            .post(self.build_url("/api/uploads/signature"))
            .bearer_auth(&self.auth_token)
            .json(req)
            .send()
            .await
            .context("Failed to send signature request")?;

        parse_json(response).await
    }

    /// `POST /api/videos`
    pub async fn create_video(&self, video: &NewVideo) -> Result<Video> {
        let response = self
            .client
            .post(self.build_url("/api/videos"))
            .bearer_auth(&self.auth_token)
            .json(video)
            .send()
            .await
            .context("Failed to send create-video request")?;

        parse_json(response).await
    }
}

impl SignatureSource for ApiClient {
    async fn request_signature(
        &self,
        req: &SignatureRequest,
    ) -> Result<UploadSignature, UploadError> {
        self.upload_signature(req)
            .await
            .map_err(|err| UploadError::Signature(format!("{:#}", err)))
    }
}

async fn parse_json<T: for<'de> serde::Deserialize<'de>>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(anyhow::anyhow!(
            "API request failed with status {}: {}",
            status,
            error_text
        ));
    }

    response
        .json()
        .await
        .context("Failed to parse response as JSON")
}
