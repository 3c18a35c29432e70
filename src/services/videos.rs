//! VideoRepository — metadata persistence for video records, backed by SQLite.

use crate::models::video::Video;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("video `{0}` not found")]
    VideoNotFound(Uuid),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;

const VIDEO_COLUMNS: &str =
    "id, created_at, updated_at, title, description, user_id, thumbnail_url, video_url";

/// Read/update access to the `videos` table.
///
/// The pipeline reads a record once per upload and writes it back once with a
/// new stored-object coordinate. Records are created via [`create`] and never
/// deleted here.
#[derive(Clone)]
pub struct VideoRepository {
    db: Arc<SqlitePool>,
}

impl VideoRepository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Insert a fresh draft record for `user_id`.
    pub async fn create(
        &self,
        user_id: Uuid,
        title: String,
        description: String,
    ) -> RepoResult<Video> {
        let now = Utc::now();
        let video = sqlx::query_as::<_, Video>(&format!(
            "INSERT INTO videos (id, created_at, updated_at, title, description, user_id)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(now)
        .bind(now)
        .bind(title)
        .bind(description)
        .bind(user_id)
        .fetch_one(&*self.db)
        .await?;
        Ok(video)
    }

    /// Fetch a record by id.
    pub async fn get(&self, video_id: Uuid) -> RepoResult<Video> {
        sqlx::query_as::<_, Video>(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos WHERE id = ?"
        ))
        .bind(video_id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => RepoError::VideoNotFound(video_id),
            other => RepoError::Sqlx(other),
        })
    }

    /// Write back the mutable fields of a record.
    pub async fn update(&self, video: &Video) -> RepoResult<()> {
        let result = sqlx::query(
            "UPDATE videos
             SET updated_at = ?, title = ?, description = ?, thumbnail_url = ?, video_url = ?
             WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(&video.title)
        .bind(&video.description)
        .bind(&video.thumbnail_url)
        .bind(&video.video_url)
        .bind(video.id)
        .execute(&*self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepoError::VideoNotFound(video.id));
        }
        Ok(())
    }
}
