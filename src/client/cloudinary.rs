//! reqwest transport for the provider's chunked upload endpoint.

use crate::services::chunked_uploader::{
    ChunkRequest, ChunkResponse, ChunkTransport, UPLOAD_ID_HEADER, UploadError,
};
use reqwest::{
    Client,
    header::CONTENT_RANGE,
    multipart::{Form, Part},
};

#[derive(Clone)]
pub struct CloudinaryTransport {
    client: Client,
    upload_host: String,
}

impl CloudinaryTransport {
    /// No request timeout is set; chunks rely on transport defaults.
    pub fn new(upload_host: impl Into<String>) -> Result<Self, UploadError> {
        let client = Client::builder()
            .build()
            .map_err(|err| UploadError::Network(err.to_string()))?;
        Ok(Self {
            client,
            upload_host: upload_host.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn upload_url(&self, cloud_name: &str) -> String {
        format!("{}/v1_1/{}/video/upload", self.upload_host, cloud_name)
    }
}

impl ChunkTransport for CloudinaryTransport {
    async fn send_chunk(&self, req: ChunkRequest) -> Result<ChunkResponse, UploadError> {
        tracing::trace!(chunk = req.index, bytes = req.body.len(), "posting chunk");
        let file = Part::bytes(req.body.to_vec()).file_name("blob");
        let form = req
            .fields
            .into_iter()
            .fold(Form::new().part("file", file), |form, (k, v)| form.text(k, v));

        let response = self
            .client
            .post(self.upload_url(&req.cloud_name))
            .header(UPLOAD_ID_HEADER, &req.upload_id)
            .header(CONTENT_RANGE, &req.content_range)
            .multipart(form)
            .send()
            .await
            .map_err(|err| UploadError::Network(err.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| UploadError::Network(err.to_string()))?;
        Ok(ChunkResponse { status, body })
    }
}
