//! Defines routes for the video API and signed object retrieval.
//!
//! ## Structure
//! - **Video records**
//!   - `POST /api/videos`                        — create a draft record
//!   - `GET  /api/videos/{video_id}`             — fetch a record with signed URLs
//!
//! - **Media ingestion**
//!   - `POST /api/videos/{video_id}/thumbnail`   — multipart thumbnail upload (10 MiB cap)
//!   - `POST /api/videos/{video_id}/video`       — multipart video upload (1 GiB cap)
//!
//! - **Object retrieval**
//!   - `GET  /objects/{bucket}/{*key}`           — stream a stored object; requires
//!     the `expires` and `sig` query params minted by presigning
//!
//! The wildcard `*key` allows the aspect-bucket prefixes like `landscape/abc.mp4`.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        object_handlers::get_object,
        upload_handlers::{
            THUMBNAIL_UPLOAD_LIMIT, VIDEO_UPLOAD_LIMIT, upload_thumbnail, upload_video,
        },
        video_handlers::{create_video, get_video},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build and return the router for the whole HTTP surface.
///
/// Body limits are per route: the upload endpoints differ by three orders of
/// magnitude, so they each carry their own `DefaultBodyLimit` layer. The
/// limiter aborts the body read once the threshold is exceeded, before the
/// pipeline stages anything to disk.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // video records
        .route("/api/videos", post(create_video))
        .route("/api/videos/{video_id}", get(get_video))
        // media ingestion
        .route(
            "/api/videos/{video_id}/thumbnail",
            post(upload_thumbnail).layer(DefaultBodyLimit::max(THUMBNAIL_UPLOAD_LIMIT)),
        )
        .route(
            "/api/videos/{video_id}/video",
            post(upload_video).layer(DefaultBodyLimit::max(VIDEO_UPLOAD_LIMIT)),
        )
        // signed object retrieval
        .route("/objects/{bucket}/{*key}", get(get_object))
}
