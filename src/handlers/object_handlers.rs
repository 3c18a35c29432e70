//! Signed object retrieval.
//!
//! The disk-backed store cannot hand out natively presigned URLs the way a
//! hosted object store would, so retrieval goes through this handler: it
//! checks the HMAC signature and expiry minted by `DiskObjectStore::presign`,
//! then streams the payload off disk without buffering it in memory.

use crate::{errors::AppError, models::video::StoredObjectRef, state::AppState};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

/// Query params carried by a presigned URL.
#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub expires: i64,
    pub sig: String,
}

/// GET `/objects/{bucket}/{*key}?expires=&sig=` — stream a stored object.
pub async fn get_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    Query(query): Query<SignedQuery>,
) -> Result<Response, AppError> {
    let reference = StoredObjectRef::new(bucket, key);
    state
        .objects
        .verify(&reference, query.expires, &query.sig)?;

    let (file, size) = state.objects.open(&reference).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type_for_key(&reference.key)),
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&size.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );

    Ok(response)
}

/// Stored keys are extension-qualified by the asset path generator, so the
/// extension is the authoritative content-type hint on the way back out.
fn content_type_for_key(key: &str) -> &'static str {
    match key.rsplit('.').next() {
        Some("mp4") => "video/mp4",
        Some("png") => "image/png",
        Some("jpeg") | Some("jpg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(content_type_for_key("landscape/abc.mp4"), "video/mp4");
        assert_eq!(content_type_for_key("abc.png"), "image/png");
        assert_eq!(content_type_for_key("abc.jpeg"), "image/jpeg");
        assert_eq!(content_type_for_key("abc.bin"), "application/octet-stream");
        assert_eq!(
            content_type_for_key("no-extension"),
            "application/octet-stream"
        );
    }
}
