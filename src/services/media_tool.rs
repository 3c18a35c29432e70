//! External media tooling: stream probing and fast-start container rewrites.
//!
//! Both operations shell out to the ffmpeg suite in production. They sit
//! behind the [`MediaTool`] trait so the pipeline can be exercised with a
//! canned implementation instead of spawned processes.

use async_trait::async_trait;
use serde::Deserialize;
use std::{
    path::{Path, PathBuf},
    process::Stdio,
};
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum MediaToolError {
    #[error("probe failed: {0}")]
    Probe(String),
    #[error("could not parse probe output: {0}")]
    ProbeOutput(#[from] serde_json::Error),
    #[error("no video streams found")]
    NoStreams,
    #[error("fast-start rewrite failed: {0}")]
    Rewrite(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type MediaToolResult<T> = Result<T, MediaToolError>;

/// Width and height of the first reported stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamGeometry {
    pub width: i64,
    pub height: i64,
}

/// Coarse aspect-ratio bucket, used as the storage key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectBucket {
    Wide,
    Tall,
    Other,
}

impl AspectBucket {
    /// Directory prefix the bucket maps to in the object store.
    pub fn prefix(self) -> &'static str {
        match self {
            AspectBucket::Wide => "landscape",
            AspectBucket::Tall => "portrait",
            AspectBucket::Other => "other",
        }
    }
}

impl StreamGeometry {
    /// Classify using integer arithmetic only, so 1919x1080-style off-by-one
    /// sources land in `Other` deterministically rather than drifting through
    /// a float comparison.
    pub fn aspect_bucket(self) -> AspectBucket {
        if self.width == self.height * 16 / 9 {
            AspectBucket::Wide
        } else if self.height == self.width * 16 / 9 {
            AspectBucket::Tall
        } else {
            AspectBucket::Other
        }
    }
}

/// Probe and rewrite capability consumed by the upload pipeline.
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Extract the first stream's geometry from a file-backed input.
    async fn probe(&self, path: &Path) -> MediaToolResult<StreamGeometry>;

    /// Stream-copy the container with metadata relocated to the front,
    /// writing to a deterministic sibling path which is returned.
    async fn rewrite_faststart(&self, input: &Path) -> MediaToolResult<PathBuf>;
}

/// Production implementation spawning `ffprobe` / `ffmpeg`.
#[derive(Clone)]
pub struct FfmpegTool {
    ffprobe_path: String,
    ffmpeg_path: String,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    #[serde(default)]
    width: i64,
    #[serde(default)]
    height: i64,
}

impl FfmpegTool {
    pub fn new(ffprobe_path: impl Into<String>, ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    fn parse_probe_output(stdout: &[u8]) -> MediaToolResult<StreamGeometry> {
        let output: ProbeOutput = serde_json::from_slice(stdout)?;
        let stream = output.streams.first().ok_or(MediaToolError::NoStreams)?;
        Ok(StreamGeometry {
            width: stream.width,
            height: stream.height,
        })
    }
}

#[async_trait]
impl MediaTool for FfmpegTool {
    async fn probe(&self, path: &Path) -> MediaToolResult<StreamGeometry> {
        let output = Command::new(&self.ffprobe_path)
            .args(["-v", "error", "-print_format", "json", "-show_streams"])
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(MediaToolError::Probe(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }

        Self::parse_probe_output(&output.stdout)
    }

    async fn rewrite_faststart(&self, input: &Path) -> MediaToolResult<PathBuf> {
        let mut output_path = input.as_os_str().to_owned();
        output_path.push(".processing");
        let output_path = PathBuf::from(output_path);

        let output = Command::new(&self.ffmpeg_path)
            .arg("-i")
            .arg(input)
            .args(["-movflags", "faststart", "-codec", "copy", "-f", "mp4"])
            .arg(&output_path)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(MediaToolError::Rewrite(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }

        Ok(output_path)
    }
}
