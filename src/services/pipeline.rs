//! UploadPipeline — the media ingestion pipeline.
//!
//! One call runs a full upload end to end: authenticate, check ownership,
//! validate the declared content type, stage the stream to scratch storage,
//! probe and fast-start-rewrite video, place the result in the object store,
//! persist the stored coordinate, and sign the response. No step is retried;
//! the first failure terminates the request. Scratch files are removed on
//! every exit path by [`ScratchFile`] drop guards.

use crate::{
    models::video::{StoredObjectRef, Video},
    services::{
        auth::{AuthError, JwtAuthenticator},
        media_tool::{MediaTool, MediaToolError},
        object_store::{ObjectStore, StoreError},
        videos::{RepoError, VideoRepository},
    },
};
use axum::http::HeaderMap;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use rand::RngCore;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use uuid::Uuid;

/// Validity window for signed URLs handed back to clients.
const SIGNED_URL_TTL: Duration = Duration::from_secs(5 * 60);

const THUMBNAIL_MEDIA_TYPES: [&str; 2] = ["image/jpeg", "image/png"];
const VIDEO_MEDIA_TYPE: &str = "video/mp4";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("not authorized to update this video")]
    NotOwner,
    #[error("unsupported media type `{0}`")]
    UnsupportedMediaType(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Tool(#[from] MediaToolError),
    #[error("processed file is empty or missing")]
    EmptyProcessedFile,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// A pipeline-owned temporary file, deleted when the guard drops.
///
/// Both the staged copy of the upload and the fast-start rewrite output are
/// held through this guard, so every terminal state of a request leaves the
/// scratch directory clean.
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Take ownership of an existing file so it is removed on drop.
    pub fn claim(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), %err, "failed to remove scratch file");
            }
        }
    }
}

/// Generate a collision-resistant, extension-qualified asset path segment.
///
/// 32 random bytes, base64 URL-safe without padding, so the identifier is a
/// valid path segment for any syntactically valid media type.
pub fn asset_path(media_type: &str) -> String {
    let mut raw = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut raw);
    let id = general_purpose::URL_SAFE_NO_PAD.encode(raw);
    format!("{id}{}", media_type_ext(media_type))
}

/// Map a `type/subtype` media type to a dot-prefixed file extension.
/// Anything that does not split into exactly two parts falls back to `.bin`.
pub fn media_type_ext(media_type: &str) -> String {
    let parts: Vec<&str> = media_type.split('/').collect();
    if parts.len() != 2 || parts[1].is_empty() {
        return ".bin".into();
    }
    format!(".{}", parts[1])
}

/// Strip parameters (`; charset=...`) and normalize case.
fn normalize_media_type(raw: &str) -> String {
    raw.split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Sequences the ingestion steps and owns authorization checks. The only
/// component that touches the metadata store.
#[derive(Clone)]
pub struct UploadPipeline {
    auth: JwtAuthenticator,
    repo: VideoRepository,
    store: Arc<dyn ObjectStore>,
    tool: Arc<dyn MediaTool>,
    scratch_dir: PathBuf,
}

impl UploadPipeline {
    pub fn new(
        auth: JwtAuthenticator,
        repo: VideoRepository,
        store: Arc<dyn ObjectStore>,
        tool: Arc<dyn MediaTool>,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            auth,
            repo,
            store,
            tool,
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Authenticate the caller and load the record they claim to own.
    /// Runs before any filesystem or storage side effect.
    async fn authorize(&self, video_id: Uuid, headers: &HeaderMap) -> PipelineResult<Video> {
        let user_id = self.auth.authenticate(headers)?;
        let video = self.repo.get(video_id).await?;
        if video.user_id != user_id {
            return Err(PipelineError::NotOwner);
        }
        Ok(video)
    }

    /// Copy an inbound stream to a uniquely named scratch file.
    async fn stage<S>(&self, stream: S) -> PipelineResult<ScratchFile>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let path = self.scratch_dir.join(format!("upload-{}", Uuid::new_v4()));
        let staged = ScratchFile::claim(path);

        let mut file = File::create(staged.path()).await?;
        pin_mut!(stream);
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        file.sync_all().await?;

        Ok(staged)
    }

    /// Ingest a thumbnail: validate, stage, place, persist, sign.
    pub async fn upload_thumbnail<S>(
        &self,
        video_id: Uuid,
        headers: &HeaderMap,
        media_type: &str,
        stream: S,
    ) -> PipelineResult<Video>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let mut video = self.authorize(video_id, headers).await?;

        let media_type = normalize_media_type(media_type);
        if !THUMBNAIL_MEDIA_TYPES.contains(&media_type.as_str()) {
            return Err(PipelineError::UnsupportedMediaType(media_type));
        }

        let staged = self.stage(stream).await?;

        let key = asset_path(&media_type);
        self.store.put(&key, staged.path(), &media_type).await?;

        let reference = StoredObjectRef::new(self.store.bucket(), key);
        tracing::info!(%video_id, key = %reference.key, "thumbnail stored");
        video.thumbnail_url = Some(reference.encode());
        self.repo.update(&video).await?;

        self.signed_view(video).await
    }

    /// Ingest a video: validate, stage, probe, fast-start rewrite, place,
    /// persist, sign.
    pub async fn upload_video<S>(
        &self,
        video_id: Uuid,
        headers: &HeaderMap,
        media_type: &str,
        stream: S,
    ) -> PipelineResult<Video>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let mut video = self.authorize(video_id, headers).await?;

        let media_type = normalize_media_type(media_type);
        if media_type != VIDEO_MEDIA_TYPE {
            return Err(PipelineError::UnsupportedMediaType(media_type));
        }

        let staged = self.stage(stream).await?;

        let geometry = self.tool.probe(staged.path()).await?;
        let bucket = geometry.aspect_bucket();
        let key = format!("{}/{}", bucket.prefix(), asset_path(&media_type));

        let processed = ScratchFile::claim(self.tool.rewrite_faststart(staged.path()).await?);
        ensure_non_empty(processed.path()).await?;

        self.store.put(&key, processed.path(), &media_type).await?;

        let reference = StoredObjectRef::new(self.store.bucket(), key);
        tracing::info!(
            %video_id,
            width = geometry.width,
            height = geometry.height,
            key = %reference.key,
            "video stored"
        );
        video.video_url = Some(reference.encode());
        self.repo.update(&video).await?;

        self.signed_view(video).await
    }

    /// Replace stored coordinates with freshly signed URLs.
    ///
    /// Unset fields pass through, as do values that do not parse as a
    /// `"bucket,key"` composite — legacy or partially initialized records
    /// must not break reads.
    pub async fn signed_view(&self, mut video: Video) -> PipelineResult<Video> {
        video.thumbnail_url = self.sign_field(video.thumbnail_url).await?;
        video.video_url = self.sign_field(video.video_url).await?;
        Ok(video)
    }

    async fn sign_field(&self, field: Option<String>) -> PipelineResult<Option<String>> {
        let Some(encoded) = field else {
            return Ok(None);
        };
        match StoredObjectRef::parse(&encoded) {
            Some(reference) => {
                let url = self.store.presign(&reference, SIGNED_URL_TTL).await?;
                Ok(Some(url))
            }
            None => Ok(Some(encoded)),
        }
    }
}

/// Post-condition for the fast-start rewrite: the output must exist and hold
/// at least one byte, regardless of what the external process reported.
async fn ensure_non_empty(path: &Path) -> PipelineResult<()> {
    match fs::metadata(path).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(PipelineError::EmptyProcessedFile),
        Err(err) if err.kind() == ErrorKind::NotFound => Err(PipelineError::EmptyProcessedFile),
        Err(err) => Err(PipelineError::Io(err)),
    }
}
