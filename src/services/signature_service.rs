//! Signed direct-upload authorization.
//!
//! The browser (or the upload CLI) talks to the storage provider directly, so
//! the server only hands out a signature binding a timestamp and a fixed set
//! of upload parameters. The client must send back exactly the parameters in
//! `signed_params`; the provider recomputes the digest and rejects anything
//! that does not match.

use crate::config::MediaConfig;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use thiserror::Error;

/// Parameters the provider excludes from its signing contract.
pub const UNSIGNED_PARAMS: [&str; 4] = ["file", "cloud_name", "resource_type", "api_key"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("storage provider configuration is incomplete: missing {0}")]
    Configuration(&'static str),
    #[error("{0}")]
    Validation(String),
}

/// Input of the signature endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRequest {
    pub timestamp: i64,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default, alias = "auto_chaptering")]
    pub auto_chaptering: Option<bool>,
    #[serde(default, alias = "resource_type")]
    pub resource_type: String,
}

/// Everything the client needs to perform a signed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSignature {
    pub signature: String,
    pub api_key: String,
    pub timestamp: i64,
    pub cloud_name: String,
    /// The exact map that was signed, `timestamp` included.
    pub signed_params: BTreeMap<String, String>,
}

#[derive(Clone, Debug)]
pub struct SignatureService {
    media: MediaConfig,
}

impl SignatureService {
    pub fn new(media: MediaConfig) -> Self {
        Self { media }
    }

    /// Sign an upload request.
    ///
    /// Pure function of configuration and input; nothing is persisted.
    pub fn generate(&self, req: &SignatureRequest) -> Result<UploadSignature, SignatureError> {
        let (api_key, api_secret, cloud_name) = self.credentials()?;

        if req.resource_type.trim().is_empty() {
            return Err(SignatureError::Validation(
                "resource_type is required for video uploads".into(),
            ));
        }

        let mut params = BTreeMap::new();
        params.insert("timestamp".to_string(), req.timestamp.to_string());
        if let Some(folder) = req.folder.as_deref().filter(|f| !f.is_empty()) {
            params.insert("folder".to_string(), folder.to_string());
        }
        if req.auto_chaptering == Some(true) {
            params.insert("auto_chaptering".to_string(), "true".to_string());
        }

        let signature = sign_params(&params, api_secret);
        tracing::debug!(
            timestamp = req.timestamp,
            params = ?params.keys().collect::<Vec<_>>(),
            "generated upload signature"
        );

        Ok(UploadSignature {
            signature,
            api_key: api_key.to_string(),
            timestamp: req.timestamp,
            cloud_name: cloud_name.to_string(),
            signed_params: params,
        })
    }

    /// True when every credential the signer needs is present.
    pub fn is_configured(&self) -> bool {
        self.credentials().is_ok()
    }

    fn credentials(&self) -> Result<(&str, &str, &str), SignatureError> {
        let api_key = present(&self.media.api_key).ok_or(SignatureError::Configuration("api key"))?;
        let api_secret =
            present(&self.media.api_secret).ok_or(SignatureError::Configuration("api secret"))?;
        let cloud_name =
            present(&self.media.cloud_name).ok_or(SignatureError::Configuration("cloud name"))?;
        Ok((api_key, api_secret, cloud_name))
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Compute the provider signature over `params`.
///
/// Keys listed in [`UNSIGNED_PARAMS`] are skipped, the rest are joined as
/// `k=v` pairs in lexicographic key order with `&`, the secret is appended
/// and the result is SHA-1 hashed to lowercase hex.
pub fn sign_params(params: &BTreeMap<String, String>, api_secret: &str) -> String {
    let to_sign = params
        .iter()
        .filter(|(k, _)| !UNSIGNED_PARAMS.contains(&k.as_str()))
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
pub(crate) fn test_media_config() -> MediaConfig {
    MediaConfig {
        cloud_name: Some("demo-cloud".into()),
        api_key: Some("123456789".into()),
        api_secret: Some("abcd".into()),
        upload_host: "https://api.cloudinary.com".into(),
        cdn_host: "https://res.cloudinary.com".into(),
        chunk_size: crate::config::DEFAULT_CHUNK_SIZE,
        chunked_threshold: crate::config::DEFAULT_CHUNKED_THRESHOLD,
    }
}
