//! Shared application state handed to every handler.

use crate::services::{
    auth::JwtAuthenticator, object_store::DiskObjectStore, pipeline::UploadPipeline,
    videos::VideoRepository,
};
use sqlx::SqlitePool;
use std::{path::PathBuf, sync::Arc};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: UploadPipeline,
    pub repo: VideoRepository,
    pub auth: JwtAuthenticator,
    /// Concrete store, needed by the retrieval handler for signature checks.
    pub objects: DiskObjectStore,
    pub db: Arc<SqlitePool>,
    pub scratch_dir: PathBuf,
}
