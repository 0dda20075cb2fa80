//! Chunked, signed direct-to-provider upload.
//!
//! An upload attempt runs this state machine:
//!
//! ```text
//! Idle -> RequestingSignature -> UploadingChunk(0) -> .. -> UploadingChunk(n-1) -> Completed
//!                   |                    |
//!                   +--> Failed <--------+--> Cancelled
//! ```
//!
//! Everything an attempt needs (upload id, retained signature, byte ranges)
//! lives in an [`UploadSession`] built once the signature arrives and never
//! mutated afterwards. Chunks go out strictly one after the other: the
//! provider reassembles by `X-Unique-Upload-Id` and expects monotonic,
//! non-overlapping ranges.
//!
//! There is no retry and no resume. A failed attempt has to be restarted
//! from chunk zero by the caller.

use crate::{
    config::MediaConfig,
    services::signature_service::{SignatureRequest, SignatureService, UploadSignature},
};
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{future::Future, io, path::PathBuf};
use thiserror::Error;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, SeekFrom},
    sync::mpsc::UnboundedSender,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

pub const UPLOAD_ID_HEADER: &str = "X-Unique-Upload-Id";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("cannot upload an empty file")]
    EmptyFile,
    #[error("upload signature request failed: {0}")]
    Signature(String),
    #[error("chunk {chunk} upload failed with status {status}: {body}")]
    Rejected {
        chunk: usize,
        status: u16,
        body: String,
    },
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Half-open byte range `[start, end)` of the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub index: usize,
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// `bytes {start}-{end-1}/{total}`
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end - 1, total)
    }
}

/// Split `[0, total)` into `ceil(total / chunk_size)` consecutive ranges.
pub fn plan_chunks(total: u64, chunk_size: u64) -> Vec<ByteRange> {
    let chunk_size = chunk_size.max(1);
    let count = total.div_ceil(chunk_size);
    (0..count)
        .map(|i| {
            let start = i * chunk_size;
            ByteRange {
                index: i as usize,
                start,
                end: (start + chunk_size).min(total),
            }
        })
        .collect()
}

/// When to split a file and how big the pieces are.
#[derive(Debug, Clone, Copy)]
pub struct ChunkPolicy {
    pub chunk_size: u64,
    /// Files at or below this size go out as a single request.
    pub chunked_threshold: u64,
}

impl ChunkPolicy {
    pub fn from_media(media: &MediaConfig) -> Self {
        Self {
            chunk_size: media.chunk_size,
            chunked_threshold: media.chunked_threshold,
        }
    }

    pub fn requires_chunking(&self, file_size: u64) -> bool {
        file_size > self.chunked_threshold
    }

    pub fn chunk_size_for(&self, file_size: u64) -> u64 {
        if self.requires_chunking(file_size) {
            self.chunk_size
        } else {
            file_size.max(1)
        }
    }
}

/// Where the bytes come from.
#[derive(Debug, Clone)]
pub enum UploadSource {
    Path(PathBuf),
    Memory(Bytes),
}

impl UploadSource {
    pub async fn size(&self) -> io::Result<u64> {
        match self {
            UploadSource::Path(path) => Ok(tokio::fs::metadata(path).await?.len()),
            UploadSource::Memory(bytes) => Ok(bytes.len() as u64),
        }
    }

    pub async fn read_range(&self, range: &ByteRange) -> io::Result<Bytes> {
        match self {
            UploadSource::Path(path) => {
                let mut file = File::open(path).await?;
                file.seek(SeekFrom::Start(range.start)).await?;
                let mut buf = vec![0u8; range.len() as usize];
                file.read_exact(&mut buf).await?;
                Ok(Bytes::from(buf))
            }
            UploadSource::Memory(bytes) => {
                Ok(bytes.slice(range.start as usize..range.end as usize))
            }
        }
    }
}

/// Parameters sent to the signer at the start of every attempt.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub folder: Option<String>,
    pub auto_chaptering: bool,
    pub resource_type: String,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            folder: Some("videos".into()),
            auto_chaptering: true,
            resource_type: "video".into(),
        }
    }
}

/// Immutable state of one upload attempt.
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub upload_id: String,
    pub signature: UploadSignature,
    pub resource_type: String,
    pub total_size: u64,
    pub ranges: Vec<ByteRange>,
}

impl UploadSession {
    pub fn new(
        signature: UploadSignature,
        resource_type: String,
        total_size: u64,
        chunk_size: u64,
    ) -> Self {
        Self {
            upload_id: format!("uqid-{}", Uuid::new_v4().simple()),
            signature,
            resource_type,
            total_size,
            ranges: plan_chunks(total_size, chunk_size),
        }
    }

    /// Build the request for `range`. Every signed parameter is echoed verbatim.
    pub fn chunk_request(&self, range: &ByteRange, body: Bytes) -> ChunkRequest {
        let sig = &self.signature;
        let mut fields = vec![
            ("api_key".to_string(), sig.api_key.clone()),
            ("timestamp".to_string(), sig.timestamp.to_string()),
            ("signature".to_string(), sig.signature.clone()),
            ("resource_type".to_string(), self.resource_type.clone()),
        ];
        fields.extend(
            sig.signed_params
                .iter()
                .filter(|(k, _)| k.as_str() != "timestamp")
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        ChunkRequest {
            index: range.index,
            upload_id: self.upload_id.clone(),
            content_range: range.content_range(self.total_size),
            cloud_name: sig.cloud_name.clone(),
            fields,
            body,
        }
    }
}

/// One POST to the provider upload endpoint.
#[derive(Debug, Clone)]
pub struct ChunkRequest {
    pub index: usize,
    pub upload_id: String,
    pub content_range: String,
    pub cloud_name: String,
    /// Form fields besides `file`, in send order.
    pub fields: Vec<(String, String)>,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct ChunkResponse {
    pub status: u16,
    pub body: String,
}

impl ChunkResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Terminal payload the provider returns with the last chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderAsset {
    pub public_id: String,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub bytes: Option<u64>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub secure_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    RequestingSignature,
    UploadingChunk(usize),
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadEvent {
    State(UploadState),
    /// Percentage of bytes queued; 100 only after the provider confirmed the last chunk.
    Progress(u8),
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Completed(ProviderAsset),
    Cancelled,
}

/// Obtains an upload signature, typically from the server's signature endpoint.
pub trait SignatureSource {
    fn request_signature(
        &self,
        req: &SignatureRequest,
    ) -> impl Future<Output = Result<UploadSignature, UploadError>> + Send;
}

/// Delivers one chunk to the provider.
///
/// Dropping the returned future must abort the request.
pub trait ChunkTransport {
    fn send_chunk(
        &self,
        req: ChunkRequest,
    ) -> impl Future<Output = Result<ChunkResponse, UploadError>> + Send;
}

impl<S: SignatureSource + Sync> SignatureSource for &S {
    fn request_signature(
        &self,
        req: &SignatureRequest,
    ) -> impl Future<Output = Result<UploadSignature, UploadError>> + Send {
        (**self).request_signature(req)
    }
}

/// In-process signing, used when uploader and signer share a binary.
impl SignatureSource for SignatureService {
    async fn request_signature(
        &self,
        req: &SignatureRequest,
    ) -> Result<UploadSignature, UploadError> {
        self.generate(req)
            .map_err(|err| UploadError::Signature(err.to_string()))
    }
}

pub struct ChunkedUploader<S, T> {
    signer: S,
    transport: T,
    chunk_size: u64,
    options: UploadOptions,
    cancel: CancellationToken,
    events: Option<UnboundedSender<UploadEvent>>,
}

impl<S, T> ChunkedUploader<S, T>
where
    S: SignatureSource,
    T: ChunkTransport,
{
    pub fn new(signer: S, transport: T, chunk_size: u64) -> Self {
        Self {
            signer,
            transport,
            chunk_size: chunk_size.max(1),
            options: UploadOptions::default(),
            cancel: CancellationToken::new(),
            events: None,
        }
    }

    pub fn with_options(mut self, options: UploadOptions) -> Self {
        self.options = options;
        self
    }

    /// Report state changes and progress on `tx`.
    pub fn with_events(mut self, tx: UnboundedSender<UploadEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Token shared with the running upload. Cancelling it is equivalent to [`Self::cancel`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the upload: no further chunk is sent and the in-flight one is aborted.
    /// Chunks already accepted by the provider are not rolled back.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Run one upload attempt.
    ///
    /// Cancellation is not an error: it resolves to [`UploadOutcome::Cancelled`].
    pub async fn upload(&self, source: &UploadSource) -> Result<UploadOutcome, UploadError> {
        let total = match source.size().await {
            Ok(0) => return Err(self.fail(UploadError::EmptyFile)),
            Ok(total) => total,
            Err(err) => return Err(self.fail(err.into())),
        };

        self.emit(UploadEvent::State(UploadState::RequestingSignature));
        let req = SignatureRequest {
            timestamp: Utc::now().timestamp(),
            folder: self.options.folder.clone(),
            auto_chaptering: Some(self.options.auto_chaptering),
            resource_type: self.options.resource_type.clone(),
        };
        let signature = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(self.cancelled()),
            res = self.signer.request_signature(&req) => match res {
                Ok(signature) => signature,
                Err(err) => return Err(self.fail(err)),
            },
        };

        let session = UploadSession::new(
            signature,
            self.options.resource_type.clone(),
            total,
            self.chunk_size,
        );
        let chunk_count = session.ranges.len();

        let mut last_response = None;
        for range in &session.ranges {
            if self.cancel.is_cancelled() {
                return Ok(self.cancelled());
            }

            self.emit(UploadEvent::State(UploadState::UploadingChunk(range.index)));
            self.emit(UploadEvent::Progress(percent(range.start, total)));

            let body = match source.read_range(range).await {
                Ok(body) => body,
                Err(err) => return Err(self.fail(err.into())),
            };
            let request = session.chunk_request(range, body);
            debug!(
                "Uploading chunk {}/{} for upload id {}; {}",
                range.index + 1,
                chunk_count,
                session.upload_id,
                request.content_range
            );

            let response = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(self.cancelled()),
                res = self.transport.send_chunk(request) => match res {
                    Ok(response) => response,
                    Err(err) => return Err(self.fail(err)),
                },
            };

            if !response.is_success() {
                return Err(self.fail(UploadError::Rejected {
                    chunk: range.index,
                    status: response.status,
                    body: response.body,
                }));
            }
            last_response = Some(response);
        }

        let Some(final_response) = last_response else {
            return Err(self.fail(UploadError::InvalidResponse(
                "no chunk was uploaded".into(),
            )));
        };
        let asset: ProviderAsset = match serde_json::from_str(&final_response.body) {
            Ok(asset) => asset,
            Err(err) => return Err(self.fail(UploadError::InvalidResponse(err.to_string()))),
        };

        self.emit(UploadEvent::Progress(100));
        self.emit(UploadEvent::State(UploadState::Completed));
        info!(
            upload_id = %session.upload_id,
            public_id = %asset.public_id,
            "File upload complete."
        );
        Ok(UploadOutcome::Completed(asset))
    }

    fn emit(&self, event: UploadEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    fn fail(&self, err: UploadError) -> UploadError {
        error!("Upload failed: {}", err);
        self.emit(UploadEvent::State(UploadState::Failed));
        err
    }

    fn cancelled(&self) -> UploadOutcome {
        info!("Upload cancelled");
        self.emit(UploadEvent::State(UploadState::Cancelled));
        UploadOutcome::Cancelled
    }
}

fn percent(done: u64, total: u64) -> u8 {
    ((done as f64 / total as f64) * 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::signature_service::{sign_params, test_media_config};
    use std::{
        collections::BTreeMap,
        sync::{
            Arc, Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };
    use tokio::sync::mpsc;

    const MIB: u64 = 1024 * 1024;

    #[derive(Debug, Clone)]
    struct Received {
        index: usize,
        upload_id: String,
        content_range: String,
        fields: BTreeMap<String, String>,
        body: Bytes,
    }

    /// Provider stub: verifies each chunk's signature against the fields it
    /// actually received, records the request, and answers like the provider.
    #[derive(Clone, Default)]
    struct ProviderStub {
        received: Arc<Mutex<Vec<Received>>>,
        fail_at: Option<usize>,
        cancel_at: Option<(usize, CancellationToken)>,
        tamper: Option<(&'static str, &'static str)>,
    }

    impl ProviderStub {
        fn received(&self) -> Vec<Received> {
            self.received.lock().unwrap().clone()
        }
    }

    impl ChunkTransport for ProviderStub {
        async fn send_chunk(&self, req: ChunkRequest) -> Result<ChunkResponse, UploadError> {
            let mut fields: BTreeMap<String, String> = req.fields.iter().cloned().collect();
            if let Some((key, value)) = self.tamper {
                fields.insert(key.to_string(), value.to_string());
            }
            self.received.lock().unwrap().push(Received {
                index: req.index,
                upload_id: req.upload_id.clone(),
                content_range: req.content_range.clone(),
                fields: fields.clone(),
                body: req.body.clone(),
            });

            if let Some((at, token)) = &self.cancel_at {
                if *at == req.index {
                    token.cancel();
                    std::future::pending::<()>().await;
                }
            }
            if self.fail_at == Some(req.index) {
                return Ok(ChunkResponse {
                    status: 500,
                    body: "internal error".into(),
                });
            }

            let claimed = fields.remove("signature").unwrap_or_default();
            if sign_params(&fields, "abcd") != claimed {
                return Ok(ChunkResponse {
                    status: 401,
                    body: r#"{"error":{"message":"Invalid Signature"}}"#.into(),
                });
            }

            let (range, total) = req
                .content_range
                .trim_start_matches("bytes ")
                .split_once('/')
                .unwrap();
            let end: u64 = range.split_once('-').unwrap().1.parse().unwrap();
            let total: u64 = total.parse().unwrap();
            let body = if end + 1 == total {
                format!(
                    r#"{{"public_id":"videos/abc123","duration":12.4,"format":"mp4","bytes":{}}}"#,
                    total
                )
            } else {
                r#"{"done":false}"#.to_string()
            };
            Ok(ChunkResponse { status: 200, body })
        }
    }

    #[derive(Clone)]
    struct CountingSigner {
        inner: SignatureService,
        calls: Arc<AtomicUsize>,
    }

    impl CountingSigner {
        fn new() -> Self {
            Self {
                inner: SignatureService::new(test_media_config()),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl SignatureSource for CountingSigner {
        async fn request_signature(
            &self,
            req: &SignatureRequest,
        ) -> Result<UploadSignature, UploadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.request_signature(req).await
        }
    }

    struct BrokenSigner;

    impl SignatureSource for BrokenSigner {
        async fn request_signature(
            &self,
            _req: &SignatureRequest,
        ) -> Result<UploadSignature, UploadError> {
            Err(UploadError::Signature("server unavailable".into()))
        }
    }

    fn source(len: u64) -> UploadSource {
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        UploadSource::Memory(Bytes::from(data))
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<UploadEvent>) -> Vec<UploadEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn progress(events: &[UploadEvent]) -> Vec<u8> {
        events
            .iter()
            .filter_map(|e| match e {
                UploadEvent::Progress(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn plan_partitions_the_file() {
        let chunk = 1000;
        for total in [1, 999, 1000, 1001, 3000, 3007, 10_000] {
            let ranges = plan_chunks(total, chunk);
            assert_eq!(ranges.len() as u64, total.div_ceil(chunk), "total {total}");
            assert_eq!(ranges[0].start, 0);
            assert_eq!(ranges.last().unwrap().end, total);
            for pair in ranges.windows(2) {
                assert_eq!(pair[0].end, pair[1].start);
                assert_eq!(pair[0].index + 1, pair[1].index);
            }
            assert!(ranges.iter().all(|r| r.len() > 0 && r.len() <= chunk));
            assert_eq!(ranges.iter().map(ByteRange::len).sum::<u64>(), total);
        }
        assert!(plan_chunks(0, chunk).is_empty());
    }

    #[test]
    fn policy_only_splits_large_files() {
        let policy = ChunkPolicy {
            chunk_size: 5 * MIB,
            chunked_threshold: 100 * MIB,
        };
        assert!(!policy.requires_chunking(100 * MIB));
        assert_eq!(policy.chunk_size_for(12 * MIB), 12 * MIB);
        assert!(policy.requires_chunking(100 * MIB + 1));
        assert_eq!(policy.chunk_size_for(200 * MIB), 5 * MIB);
        assert_eq!(plan_chunks(12 * MIB, policy.chunk_size_for(12 * MIB)).len(), 1);
    }

    #[tokio::test]
    async fn twelve_mib_file_goes_out_in_three_chunks() {
        let provider = ProviderStub::default();
        let signer = CountingSigner::new();
        let uploader = ChunkedUploader::new(signer.clone(), provider.clone(), 5 * MIB);
        let src = source(12 * MIB);

        let outcome = uploader.upload(&src).await.unwrap();
        let UploadOutcome::Completed(asset) = outcome else {
            panic!("expected completion, got {outcome:?}");
        };
        assert_eq!(asset.public_id, "videos/abc123");
        assert_eq!(asset.duration, Some(12.4));
        assert_eq!(asset.bytes, Some(12 * MIB));

        let received = provider.received();
        let sizes: Vec<usize> = received.iter().map(|r| r.body.len()).collect();
        assert_eq!(sizes, vec![5 * MIB as usize, 5 * MIB as usize, 2 * MIB as usize]);
        let ranges: Vec<&str> = received.iter().map(|r| r.content_range.as_str()).collect();
        assert_eq!(
            ranges,
            vec![
                "bytes 0-5242879/12582912",
                "bytes 5242880-10485759/12582912",
                "bytes 10485760-12582911/12582912",
            ]
        );

        // one logical upload: same id everywhere, bytes reassemble to the source
        assert!(received.iter().all(|r| r.upload_id == received[0].upload_id));
        assert!(received[0].upload_id.starts_with("uqid-"));
        let mut reassembled = Vec::new();
        for r in &received {
            reassembled.extend_from_slice(&r.body);
        }
        let UploadSource::Memory(original) = src else { unreachable!() };
        assert_eq!(Bytes::from(reassembled), original);

        // signature fetched once, reused for every chunk
        assert_eq!(signer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn every_chunk_echoes_the_signed_params() {
        let provider = ProviderStub::default();
        let uploader = ChunkedUploader::new(CountingSigner::new(), provider.clone(), 1000);
        uploader.upload(&source(2500)).await.unwrap();

        let received = provider.received();
        assert_eq!(received.len(), 3);
        let first = &received[0].fields;
        assert_eq!(first["folder"], "videos");
        assert_eq!(first["auto_chaptering"], "true");
        assert_eq!(first["resource_type"], "video");
        assert_eq!(first["api_key"], "123456789");
        assert!(first.contains_key("timestamp"));
        assert!(first.contains_key("signature"));
        assert!(received.iter().all(|r| &r.fields == first));
    }

    #[test]
    fn chunk_request_sends_timestamp_once() {
        let signature = SignatureService::new(test_media_config())
            .generate(&SignatureRequest {
                timestamp: 1_700_000_000,
                folder: Some("videos".into()),
                auto_chaptering: Some(true),
                resource_type: "video".into(),
            })
            .unwrap();
        let session = UploadSession::new(signature, "video".into(), 10, 4);
        let req = session.chunk_request(&session.ranges[2], Bytes::from_static(b"xy"));

        assert_eq!(req.content_range, "bytes 8-9/10");
        assert_eq!(req.cloud_name, "demo-cloud");
        let timestamps = req.fields.iter().filter(|(k, _)| k == "timestamp").count();
        assert_eq!(timestamps, 1);
    }

    #[tokio::test]
    async fn tampered_signed_param_is_rejected() {
        let provider = ProviderStub {
            tamper: Some(("folder", "somewhere-else")),
            ..Default::default()
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        let uploader =
            ChunkedUploader::new(CountingSigner::new(), provider.clone(), 1000).with_events(tx);

        let err = uploader.upload(&source(2500)).await.unwrap_err();
        assert!(
            matches!(err, UploadError::Rejected { chunk: 0, status: 401, .. }),
            "got {err:?}"
        );
        assert_eq!(provider.received().len(), 1);
        let events = drain(&mut rx);
        assert_eq!(events.last(), Some(&UploadEvent::State(UploadState::Failed)));
    }

    #[tokio::test]
    async fn progress_is_monotonic_and_ends_at_100() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let uploader = ChunkedUploader::new(CountingSigner::new(), ProviderStub::default(), 5 * MIB)
            .with_events(tx);
        uploader.upload(&source(12 * MIB)).await.unwrap();

        let events = drain(&mut rx);
        assert_eq!(progress(&events), vec![0, 42, 83, 100]);
        assert_eq!(
            events
                .iter()
                .filter_map(|e| match e {
                    UploadEvent::State(s) => Some(*s),
                    _ => None,
                })
                .collect::<Vec<_>>(),
            vec![
                UploadState::RequestingSignature,
                UploadState::UploadingChunk(0),
                UploadState::UploadingChunk(1),
                UploadState::UploadingChunk(2),
                UploadState::Completed,
            ]
        );
    }

    #[tokio::test]
    async fn cancel_mid_upload_stops_further_chunks() {
        let uploader_token = CancellationToken::new();
        let provider = ProviderStub {
            cancel_at: Some((1, uploader_token.clone())),
            ..Default::default()
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut uploader =
            ChunkedUploader::new(CountingSigner::new(), provider.clone(), 1000).with_events(tx);
        uploader.cancel = uploader_token;

        let outcome = uploader.upload(&source(5000)).await.unwrap();
        assert_eq!(outcome, UploadOutcome::Cancelled);

        let indices: Vec<usize> = provider.received().iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1]);

        let events = drain(&mut rx);
        assert_eq!(events.last(), Some(&UploadEvent::State(UploadState::Cancelled)));
        assert!(!events.contains(&UploadEvent::State(UploadState::Failed)));
        assert!(!progress(&events).contains(&100));
    }

    #[tokio::test]
    async fn cancel_before_start_sends_nothing() {
        let provider = ProviderStub::default();
        let signer = CountingSigner::new();
        let uploader = ChunkedUploader::new(signer.clone(), provider.clone(), 1000);
        uploader.cancel();

        let outcome = uploader.upload(&source(2500)).await.unwrap();
        assert_eq!(outcome, UploadOutcome::Cancelled);
        assert!(provider.received().is_empty());
        assert_eq!(signer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_chunk_aborts_without_retry() {
        let provider = ProviderStub {
            fail_at: Some(1),
            ..Default::default()
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        let uploader =
            ChunkedUploader::new(CountingSigner::new(), provider.clone(), 1000).with_events(tx);

        let err = uploader.upload(&source(3500)).await.unwrap_err();
        assert!(matches!(err, UploadError::Rejected { chunk: 1, status: 500, .. }));
        assert_eq!(provider.received().len(), 2);

        let events = drain(&mut rx);
        assert_eq!(progress(&events), vec![0, 29]);
        assert_eq!(events.last(), Some(&UploadEvent::State(UploadState::Failed)));
    }

    #[tokio::test]
    async fn signature_failure_sends_no_chunks() {
        let provider = ProviderStub::default();
        let uploader = ChunkedUploader::new(BrokenSigner, provider.clone(), 1000);
        let err = uploader.upload(&source(2500)).await.unwrap_err();
        assert!(matches!(err, UploadError::Signature(_)));
        assert!(provider.received().is_empty());
    }

    #[tokio::test]
    async fn empty_file_is_refused() {
        let provider = ProviderStub::default();
        let uploader = ChunkedUploader::new(CountingSigner::new(), provider.clone(), 1000);
        let err = uploader
            .upload(&UploadSource::Memory(Bytes::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::EmptyFile));
        assert!(provider.received().is_empty());
    }

    #[tokio::test]
    async fn reads_ranges_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        let data: Vec<u8> = (0..2500u32).map(|i| (i % 7) as u8).collect();
        tokio::fs::write(&path, &data).await.unwrap();

        let provider = ProviderStub::default();
        let uploader = ChunkedUploader::new(CountingSigner::new(), provider.clone(), 1000);
        let outcome = uploader.upload(&UploadSource::Path(path)).await.unwrap();
        assert!(matches!(outcome, UploadOutcome::Completed(_)));

        let received = provider.received();
        assert_eq!(received[2].body.as_ref(), &data[2000..2500]);
    }

    #[tokio::test]
    async fn unparseable_final_payload_fails() {
        struct Garbage;
        impl ChunkTransport for Garbage {
            async fn send_chunk(&self, _req: ChunkRequest) -> Result<ChunkResponse, UploadError> {
                Ok(ChunkResponse {
                    status: 200,
                    body: "<html>".into(),
                })
            }
        }

        let uploader = ChunkedUploader::new(CountingSigner::new(), Garbage, 1000);
        let err = uploader.upload(&source(10)).await.unwrap_err();
        assert!(matches!(err, UploadError::InvalidResponse(_)));
    }
}
