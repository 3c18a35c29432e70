//! End-to-end tests for the upload pipeline using a canned media tool, an
//! in-memory SQLite database, and a disk store rooted in temp directories.

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, header};
use bytes::Bytes;
use chrono::Duration;
use clipvault::models::video::{StoredObjectRef, Video};
use clipvault::services::{
    auth::JwtAuthenticator,
    media_tool::{MediaTool, MediaToolError, MediaToolResult, StreamGeometry},
    object_store::DiskObjectStore,
    pipeline::{PipelineError, UploadPipeline},
    videos::VideoRepository,
};
use futures::stream;
use sqlx::sqlite::SqlitePoolOptions;
use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};
use tempfile::TempDir;
use uuid::Uuid;

const JWT_SECRET: &str = "pipeline-test-jwt-secret";

/// Canned stand-in for ffprobe/ffmpeg.
struct FakeTool {
    geometry: Result<StreamGeometry, &'static str>,
    rewrite: RewriteBehavior,
}

enum RewriteBehavior {
    Copy,
    ZeroByte,
    Fail,
}

impl FakeTool {
    fn with_geometry(width: i64, height: i64) -> Self {
        Self {
            geometry: Ok(StreamGeometry { width, height }),
            rewrite: RewriteBehavior::Copy,
        }
    }
}

#[async_trait]
impl MediaTool for FakeTool {
    async fn probe(&self, _path: &Path) -> MediaToolResult<StreamGeometry> {
        self.geometry
            .map_err(|msg| MediaToolError::Probe(msg.to_string()))
    }

    async fn rewrite_faststart(&self, input: &Path) -> MediaToolResult<PathBuf> {
        let mut output = input.as_os_str().to_owned();
        output.push(".processing");
        let output = PathBuf::from(output);
        match self.rewrite {
            RewriteBehavior::Copy => {
                tokio::fs::copy(input, &output).await?;
            }
            RewriteBehavior::ZeroByte => {
                tokio::fs::write(&output, b"").await?;
            }
            RewriteBehavior::Fail => {
                return Err(MediaToolError::Rewrite("canned failure".into()));
            }
        }
        Ok(output)
    }
}

struct TestHarness {
    pipeline: UploadPipeline,
    repo: VideoRepository,
    auth: JwtAuthenticator,
    _storage_dir: TempDir,
    storage_path: PathBuf,
    _scratch_dir: TempDir,
    scratch_path: PathBuf,
}

impl TestHarness {
    async fn new(tool: FakeTool) -> Self {
        let db = Arc::new(
            SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await
                .unwrap(),
        );
        for stmt in include_str!("../migrations/0001_init.sql")
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            sqlx::query(stmt).execute(&*db).await.unwrap();
        }

        let storage_dir = TempDir::new().unwrap();
        let scratch_dir = TempDir::new().unwrap();
        let storage_path = storage_dir.path().to_path_buf();
        let scratch_path = scratch_dir.path().to_path_buf();

        let auth = JwtAuthenticator::new(JWT_SECRET);
        let repo = VideoRepository::new(db.clone());
        let store = DiskObjectStore::new(
            &storage_path,
            "test-media",
            "http://localhost:3000",
            "signing-secret",
        );
        let pipeline = UploadPipeline::new(
            auth.clone(),
            repo.clone(),
            Arc::new(store),
            Arc::new(tool),
            &scratch_path,
        );

        Self {
            pipeline,
            repo,
            auth,
            _storage_dir: storage_dir,
            storage_path,
            _scratch_dir: scratch_dir,
            scratch_path,
        }
    }

    async fn seed_video(&self, owner: Uuid) -> Video {
        self.repo
            .create(owner, "a title".into(), "a description".into())
            .await
            .unwrap()
    }

    fn headers_for(&self, user_id: Uuid) -> HeaderMap {
        let token = self.auth.issue(user_id, Duration::minutes(5)).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    fn scratch_is_empty(&self) -> bool {
        std::fs::read_dir(&self.scratch_path).unwrap().count() == 0
    }

    fn stored_object_count(&self) -> usize {
        walk_files(&self.storage_path)
    }
}

fn walk_files(dir: &Path) -> usize {
    let mut count = 0;
    for entry in std::fs::read_dir(dir).unwrap() {
        let entry = entry.unwrap();
        if entry.file_type().unwrap().is_dir() {
            count += walk_files(&entry.path());
        } else {
            count += 1;
        }
    }
    count
}

fn body(bytes: &'static [u8]) -> impl futures::Stream<Item = io::Result<Bytes>> {
    stream::iter(vec![Ok(Bytes::from_static(bytes))])
}

#[tokio::test]
async fn thumbnail_upload_persists_composite_and_signs_response() {
    let harness = TestHarness::new(FakeTool::with_geometry(0, 0)).await;
    let owner = Uuid::new_v4();
    let video = harness.seed_video(owner).await;
    let headers = harness.headers_for(owner);

    let updated = harness
        .pipeline
        .upload_thumbnail(video.id, &headers, "image/png", body(b"png bytes"))
        .await
        .unwrap();

    // Response carries a signed URL, not the stored coordinate.
    let signed = updated.thumbnail_url.unwrap();
    assert!(signed.starts_with("http://localhost:3000/objects/test-media/"));
    assert!(signed.contains("expires=") && signed.contains("sig="));
    let signed_path = signed.split('?').next().unwrap();
    assert!(signed_path.ends_with(".png"));

    // The database row keeps the composite form.
    let persisted = harness.repo.get(video.id).await.unwrap();
    let reference = StoredObjectRef::parse(&persisted.thumbnail_url.unwrap()).unwrap();
    assert_eq!(reference.bucket, "test-media");
    assert!(reference.key.ends_with(".png"));
    assert!(!reference.key.contains('/'));

    assert!(harness.scratch_is_empty());
    assert_eq!(harness.stored_object_count(), 1);
}

#[tokio::test]
async fn wide_video_lands_under_landscape_prefix() {
    let harness = TestHarness::new(FakeTool::with_geometry(1920, 1080)).await;
    let owner = Uuid::new_v4();
    let video = harness.seed_video(owner).await;
    let headers = harness.headers_for(owner);

    harness
        .pipeline
        .upload_video(video.id, &headers, "video/mp4", body(b"mp4 payload"))
        .await
        .unwrap();

    let persisted = harness.repo.get(video.id).await.unwrap();
    let reference = StoredObjectRef::parse(&persisted.video_url.unwrap()).unwrap();
    assert!(reference.key.starts_with("landscape/"));
    assert!(reference.key.ends_with(".mp4"));

    assert!(harness.scratch_is_empty());
    assert_eq!(harness.stored_object_count(), 1);
}

#[tokio::test]
async fn tall_and_square_videos_land_in_their_buckets() {
    for (width, height, prefix) in [(1080, 1920, "portrait/"), (1000, 1000, "other/")] {
        let harness = TestHarness::new(FakeTool::with_geometry(width, height)).await;
        let owner = Uuid::new_v4();
        let video = harness.seed_video(owner).await;
        let headers = harness.headers_for(owner);

        harness
            .pipeline
            .upload_video(video.id, &headers, "video/mp4", body(b"mp4 payload"))
            .await
            .unwrap();

        let persisted = harness.repo.get(video.id).await.unwrap();
        let reference = StoredObjectRef::parse(&persisted.video_url.unwrap()).unwrap();
        assert!(
            reference.key.starts_with(prefix),
            "{}x{} should map to {prefix}",
            width,
            height
        );
    }
}

#[tokio::test]
async fn unsupported_media_type_is_rejected_before_staging() {
    let harness = TestHarness::new(FakeTool::with_geometry(1920, 1080)).await;
    let owner = Uuid::new_v4();
    let video = harness.seed_video(owner).await;
    let headers = harness.headers_for(owner);

    let err = harness
        .pipeline
        .upload_video(video.id, &headers, "video/webm", body(b"webm payload"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::UnsupportedMediaType(_)));

    let err = harness
        .pipeline
        .upload_thumbnail(video.id, &headers, "image/gif", body(b"gif payload"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::UnsupportedMediaType(_)));

    assert!(harness.scratch_is_empty());
    assert_eq!(harness.stored_object_count(), 0);
    assert!(harness.repo.get(video.id).await.unwrap().video_url.is_none());
}

#[tokio::test]
async fn non_owner_is_rejected_before_any_side_effect() {
    let harness = TestHarness::new(FakeTool::with_geometry(1920, 1080)).await;
    let owner = Uuid::new_v4();
    let video = harness.seed_video(owner).await;
    let intruder_headers = harness.headers_for(Uuid::new_v4());

    let err = harness
        .pipeline
        .upload_video(video.id, &intruder_headers, "video/mp4", body(b"payload"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::NotOwner));

    assert!(harness.scratch_is_empty());
    assert_eq!(harness.stored_object_count(), 0);
}

#[tokio::test]
async fn missing_token_is_an_auth_failure() {
    let harness = TestHarness::new(FakeTool::with_geometry(1920, 1080)).await;
    let owner = Uuid::new_v4();
    let video = harness.seed_video(owner).await;

    let err = harness
        .pipeline
        .upload_video(video.id, &HeaderMap::new(), "video/mp4", body(b"payload"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Auth(_)));
}

#[tokio::test]
async fn unknown_video_id_is_not_found() {
    let harness = TestHarness::new(FakeTool::with_geometry(1920, 1080)).await;
    let headers = harness.headers_for(Uuid::new_v4());

    let err = harness
        .pipeline
        .upload_video(Uuid::new_v4(), &headers, "video/mp4", body(b"payload"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Repo(_)));
}

#[tokio::test]
async fn zero_byte_rewrite_output_fails_without_touching_the_store() {
    let harness = TestHarness::new(FakeTool {
        geometry: Ok(StreamGeometry {
            width: 1920,
            height: 1080,
        }),
        rewrite: RewriteBehavior::ZeroByte,
    })
    .await;
    let owner = Uuid::new_v4();
    let video = harness.seed_video(owner).await;
    let headers = harness.headers_for(owner);

    let err = harness
        .pipeline
        .upload_video(video.id, &headers, "video/mp4", body(b"payload"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::EmptyProcessedFile));

    assert_eq!(harness.stored_object_count(), 0);
    assert!(harness.scratch_is_empty());
    assert!(harness.repo.get(video.id).await.unwrap().video_url.is_none());
}

#[tokio::test]
async fn rewrite_failure_cleans_scratch_and_skips_upload() {
    let harness = TestHarness::new(FakeTool {
        geometry: Ok(StreamGeometry {
            width: 1920,
            height: 1080,
        }),
        rewrite: RewriteBehavior::Fail,
    })
    .await;
    let owner = Uuid::new_v4();
    let video = harness.seed_video(owner).await;
    let headers = harness.headers_for(owner);

    let err = harness
        .pipeline
        .upload_video(video.id, &headers, "video/mp4", body(b"payload"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Tool(MediaToolError::Rewrite(_))));

    assert_eq!(harness.stored_object_count(), 0);
    assert!(harness.scratch_is_empty());
}

#[tokio::test]
async fn probe_failure_cleans_scratch() {
    let harness = TestHarness::new(FakeTool {
        geometry: Err("probe exploded"),
        rewrite: RewriteBehavior::Copy,
    })
    .await;
    let owner = Uuid::new_v4();
    let video = harness.seed_video(owner).await;
    let headers = harness.headers_for(owner);

    let err = harness
        .pipeline
        .upload_video(video.id, &headers, "video/mp4", body(b"payload"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Tool(MediaToolError::Probe(_))));
    assert!(harness.scratch_is_empty());
}

#[tokio::test]
async fn signed_view_passes_through_unset_and_malformed_references() {
    let harness = TestHarness::new(FakeTool::with_geometry(0, 0)).await;
    let owner = Uuid::new_v4();
    let mut video = harness.seed_video(owner).await;

    // No reference set: nothing changes.
    let unchanged = harness.pipeline.signed_view(video.clone()).await.unwrap();
    assert!(unchanged.thumbnail_url.is_none());
    assert!(unchanged.video_url.is_none());

    // Malformed composite (no comma): left as-is rather than failing.
    video.video_url = Some("legacy-value-without-comma".into());
    let unchanged = harness.pipeline.signed_view(video).await.unwrap();
    assert_eq!(
        unchanged.video_url.as_deref(),
        Some("legacy-value-without-comma")
    );
}

#[tokio::test]
async fn signing_twice_points_at_the_same_key() {
    let harness = TestHarness::new(FakeTool::with_geometry(0, 0)).await;
    let owner = Uuid::new_v4();
    let mut video = harness.seed_video(owner).await;
    video.video_url = Some("test-media,landscape/stable-key.mp4".into());

    let first = harness
        .pipeline
        .signed_view(video.clone())
        .await
        .unwrap()
        .video_url
        .unwrap();
    let second = harness
        .pipeline
        .signed_view(video)
        .await
        .unwrap()
        .video_url
        .unwrap();

    // Expiries may differ, but both URLs address the same object path.
    let path_of = |url: &str| url.split('?').next().unwrap().to_string();
    assert_eq!(path_of(&first), path_of(&second));
    assert!(first.split('?').next().unwrap().ends_with("landscape/stable-key.mp4"));
}
