//! Object storage for finished media payloads.
//!
//! The pipeline only sees the [`ObjectStore`] trait: put a local file under a
//! key, presign a stored coordinate for read access. [`DiskObjectStore`] is
//! the shipped backend — payloads live under `base_path/{bucket}/{key}` and
//! presigned URLs carry an HMAC-SHA256 signature over the coordinate and an
//! expiry timestamp, checked again by the retrieval handler.

use crate::models::video::StoredObjectRef;
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::{AsyncReadExt, AsyncWriteExt},
};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("invalid object key")]
    InvalidKey,
    #[error("signature mismatch for `{0}`")]
    BadSignature(String),
    #[error("signed url expired")]
    UrlExpired,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of a completed put: payload size and content checksum.
#[derive(Debug, Clone)]
pub struct PutOutcome {
    pub size_bytes: i64,
    pub etag: String,
}

/// Storage backend seen by the upload pipeline.
///
/// A put is a single attempt; the backend either stores the whole payload or
/// reports one failure. Presigning is recomputed on every call, so two URLs
/// for the same coordinate may differ while pointing at the same object.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket new uploads are placed in.
    fn bucket(&self) -> &str;

    /// Store the file at `source` under `key` with the declared content type.
    async fn put(&self, key: &str, source: &Path, content_type: &str) -> StoreResult<PutOutcome>;

    /// Produce a time-limited retrieval URL for a stored coordinate.
    async fn presign(&self, reference: &StoredObjectRef, ttl: Duration) -> StoreResult<String>;
}

/// Local-disk backend with HMAC-signed retrieval URLs.
#[derive(Clone)]
pub struct DiskObjectStore {
    base_path: PathBuf,
    bucket: String,
    public_base_url: String,
    signing_key: Vec<u8>,
}

const COPY_CHUNK: usize = 64 * 1024;
const MAX_OBJECT_KEY_LEN: usize = 1024;

impl DiskObjectStore {
    pub fn new(
        base_path: impl Into<PathBuf>,
        bucket: impl Into<String>,
        public_base_url: impl Into<String>,
        signing_secret: &str,
    ) -> Self {
        Self {
            base_path: base_path.into(),
            bucket: bucket.into(),
            public_base_url: public_base_url.into(),
            signing_key: signing_secret.as_bytes().to_vec(),
        }
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    ///
    /// Rejects keys that begin with `/` or contain `..`. Generated asset keys
    /// always pass; this guards the retrieval path, which echoes client input.
    fn ensure_key_safe(key: &str) -> StoreResult<()> {
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
            return Err(StoreError::InvalidKey);
        }
        if key.starts_with('/') || key.contains("..") {
            return Err(StoreError::InvalidKey);
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(StoreError::InvalidKey);
        }
        Ok(())
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        let mut path = self.base_path.clone();
        path.push(bucket);
        path.push(key);
        path
    }

    fn signature(&self, bucket: &str, key: &str, expires: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.signing_key)
            .expect("HMAC accepts keys of any length");
        mac.update(format!("{bucket}\n{key}\n{expires}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Check the signature and expiry carried by a retrieval request.
    pub fn verify(&self, reference: &StoredObjectRef, expires: i64, sig: &str) -> StoreResult<()> {
        Self::ensure_key_safe(&reference.key)?;
        let expected = self.signature(&reference.bucket, &reference.key, expires);
        if expected != sig {
            return Err(StoreError::BadSignature(reference.key.clone()));
        }
        if expires < Utc::now().timestamp() {
            return Err(StoreError::UrlExpired);
        }
        Ok(())
    }

    /// Open a stored object for streaming out. Returns the file and its size.
    pub async fn open(&self, reference: &StoredObjectRef) -> StoreResult<(File, u64)> {
        Self::ensure_key_safe(&reference.key)?;
        let path = self.object_path(&reference.bucket, &reference.key);
        let file = File::open(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::ObjectNotFound {
                    bucket: reference.bucket.clone(),
                    key: reference.key.clone(),
                }
            } else {
                StoreError::Io(err)
            }
        })?;
        let size = file.metadata().await?.len();
        Ok((file, size))
    }
}

#[async_trait]
impl ObjectStore for DiskObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Copy `source` into place, computing the MD5 etag while streaming.
    ///
    /// Writes to a uniquely named temp file first and renames into the final
    /// location, so a failed put never leaves a partial object visible.
    async fn put(&self, key: &str, source: &Path, content_type: &str) -> StoreResult<PutOutcome> {
        Self::ensure_key_safe(key)?;

        let file_path = self.object_path(&self.bucket, key);
        let parent = file_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| StoreError::Io(io::Error::other("object path missing parent")))?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        let result = copy_with_digest(source, &tmp_path).await;
        let (size_bytes, etag) = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StoreError::Io(err));
            }
        };

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StoreError::Io(err));
            }
        }

        tracing::debug!(
            bucket = %self.bucket,
            key,
            size_bytes,
            content_type,
            "stored object"
        );

        Ok(PutOutcome { size_bytes, etag })
    }

    async fn presign(&self, reference: &StoredObjectRef, ttl: Duration) -> StoreResult<String> {
        Self::ensure_key_safe(&reference.key)?;
        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        let sig = self.signature(&reference.bucket, &reference.key, expires);
        Ok(format!(
            "{}/objects/{}/{}?expires={}&sig={}",
            self.public_base_url.trim_end_matches('/'),
            reference.bucket,
            reference.key,
            expires,
            sig
        ))
    }
}

/// Chunked copy from `source` to `dest` returning (size, md5 hex).
async fn copy_with_digest(source: &Path, dest: &Path) -> io::Result<(i64, String)> {
    let mut input = File::open(source).await?;
    let mut output = File::create(dest).await?;

    let mut size_bytes: i64 = 0;
    let mut digest = md5::Context::new();
    let mut buf = vec![0u8; COPY_CHUNK];
    loop {
        let read = input.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        size_bytes += read as i64;
        digest.consume(&buf[..read]);
        output.write_all(&buf[..read]).await?;
    }
    output.flush().await?;
    output.sync_all().await?;

    Ok((size_bytes, format!("{:x}", digest.compute())))
}
