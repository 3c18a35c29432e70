//! HTTP handlers for video record creation and retrieval.

use crate::{errors::AppError, models::video::Video, state::AppState};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateVideoReq {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// POST `/api/videos` — create a draft record for the authenticated user.
/// Media gets attached later through the upload endpoints.
pub async fn create_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateVideoReq>,
) -> Result<(StatusCode, Json<Video>), AppError> {
    let user_id = state.auth.authenticate(&headers)?;
    let video = state
        .repo
        .create(user_id, payload.title, payload.description)
        .await?;
    Ok((StatusCode::CREATED, Json(video)))
}

/// GET `/api/videos/{video_id}` — fetch a record with freshly signed URLs.
///
/// The persisted columns hold `"bucket,key"` coordinates; signing happens on
/// every read so responses never expose a raw storage key.
pub async fn get_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> Result<Json<Video>, AppError> {
    let video_id =
        Uuid::parse_str(&video_id).map_err(|_| AppError::bad_request("Invalid video ID"))?;
    let video = state.repo.get(video_id).await?;
    let video = state.pipeline.signed_view(video).await?;
    Ok(Json(video))
}
