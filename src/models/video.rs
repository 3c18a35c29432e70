//! Represents a hosted video and its stored-object coordinates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A video record owned by a user.
///
/// `thumbnail_url` and `video_url` are misnomers inherited from the API
/// surface: the persisted columns hold the composite `"bucket,key"` encoding
/// of a [`StoredObjectRef`], never a servable URL. They are swapped for
/// freshly signed URLs on every read before leaving the service.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Video {
    /// Unique identifier for this video.
    pub id: Uuid,

    /// When this record was created.
    pub created_at: DateTime<Utc>,

    /// When this record was last modified.
    pub updated_at: DateTime<Utc>,

    /// Display title.
    pub title: String,

    /// Free-form description.
    pub description: String,

    /// ID of the owning user. Only the owner may attach media.
    pub user_id: Uuid,

    /// Stored thumbnail coordinate (`"bucket,key"`), if a thumbnail was uploaded.
    pub thumbnail_url: Option<String>,

    /// Stored video coordinate (`"bucket,key"`), if media was uploaded.
    pub video_url: Option<String>,
}

/// Object-store coordinate for a stored asset.
///
/// The delimiter-string form (`"bucket,key"`) exists only at the persistence
/// boundary; everything above it works with the two fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObjectRef {
    pub bucket: String,
    pub key: String,
}

impl StoredObjectRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Encode into the persisted `"bucket,key"` form.
    pub fn encode(&self) -> String {
        format!("{},{}", self.bucket, self.key)
    }

    /// Parse the persisted form. Returns `None` unless the string splits into
    /// exactly a non-empty bucket and a non-empty key on the first comma.
    pub fn parse(encoded: &str) -> Option<Self> {
        let (bucket, key) = encoded.split_once(',')?;
        if bucket.is_empty() || key.is_empty() {
            return None;
        }
        Some(Self::new(bucket, key))
    }
}
