//! HTTP handlers for the two upload endpoints.
//!
//! Each handler pulls the single file field out of the multipart form and
//! hands the chunk stream straight to the pipeline, so large uploads are
//! never buffered in memory. Body size is capped per route by
//! `DefaultBodyLimit` before any byte reaches the pipeline.

use crate::{errors::AppError, models::video::Video, state::AppState};
use axum::{
    Json,
    extract::{Multipart, Path, State, multipart::Field},
    http::HeaderMap,
};
use bytes::Bytes;
use futures::{Stream, stream};
use std::io;
use uuid::Uuid;

/// Max request body for thumbnail uploads (10 MiB).
pub const THUMBNAIL_UPLOAD_LIMIT: usize = 10 << 20;

/// Max request body for video uploads (1 GiB).
pub const VIDEO_UPLOAD_LIMIT: usize = 1 << 30;

/// POST `/api/videos/{video_id}/thumbnail` — attach a thumbnail image.
pub async fn upload_thumbnail(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<Video>, AppError> {
    let video_id = parse_video_id(&video_id)?;
    let field = file_field(&mut multipart, "thumbnail").await?;
    let media_type = declared_media_type(&field)?;

    let video = state
        .pipeline
        .upload_thumbnail(video_id, &headers, &media_type, field_stream(field))
        .await?;
    Ok(Json(video))
}

/// POST `/api/videos/{video_id}/video` — attach the video media itself.
pub async fn upload_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<Video>, AppError> {
    let video_id = parse_video_id(&video_id)?;
    let field = file_field(&mut multipart, "video").await?;
    let media_type = declared_media_type(&field)?;

    let video = state
        .pipeline
        .upload_video(video_id, &headers, &media_type, field_stream(field))
        .await?;
    Ok(Json(video))
}

fn parse_video_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::bad_request("Invalid video ID"))
}

/// The endpoints accept exactly one file field, so the first form field must
/// carry the expected name.
async fn file_field<'a>(
    multipart: &'a mut Multipart,
    field_name: &str,
) -> Result<Field<'a>, AppError> {
    multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("Unable to parse form file: {err}")))?
        .filter(|field| field.name() == Some(field_name))
        .ok_or_else(|| AppError::bad_request(format!("missing `{field_name}` form field")))
}

fn declared_media_type(field: &Field<'_>) -> Result<String, AppError> {
    field
        .content_type()
        .map(str::to_string)
        .ok_or_else(|| AppError::bad_request("Invalid Content-Type"))
}

/// Expose a multipart field as a fallible chunk stream for the pipeline.
fn field_stream(field: Field<'_>) -> impl Stream<Item = io::Result<Bytes>> + '_ {
    stream::try_unfold(field, |mut field| async move {
        match field.chunk().await {
            Ok(Some(chunk)) => Ok(Some((chunk, field))),
            Ok(None) => Ok(None),
            Err(err) => Err(io::Error::other(err)),
        }
    })
}
