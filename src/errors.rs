use crate::services::{
    auth::AuthError,
    object_store::StoreError,
    pipeline::PipelineError,
    videos::RepoError,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

/// Map pipeline failures onto the client-facing taxonomy: bad input -> 400,
/// auth and ownership -> 401, missing records -> 404, everything else
/// (process invocation, storage, persistence) -> 500. Diagnostic detail such
/// as transcoder stderr rides along in the message and is logged server-side.
impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        let status = match &err {
            PipelineError::UnsupportedMediaType(_) => StatusCode::BAD_REQUEST,
            PipelineError::Auth(_) | PipelineError::NotOwner => StatusCode::UNAUTHORIZED,
            PipelineError::Repo(RepoError::VideoNotFound(_)) => StatusCode::NOT_FOUND,
            PipelineError::Repo(_)
            | PipelineError::Tool(_)
            | PipelineError::EmptyProcessedFile
            | PipelineError::Store(_)
            | PipelineError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError::new(status, err.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::new(StatusCode::UNAUTHORIZED, err.to_string())
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::VideoNotFound(_) => AppError::not_found(err.to_string()),
            RepoError::Sqlx(_) => AppError::internal(err.to_string()),
        }
    }
}

/// Retrieval-path mapping: bad or expired signatures read as 403, unknown
/// objects as 404, malformed keys as 400.
impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let status = match &err {
            StoreError::ObjectNotFound { .. } => StatusCode::NOT_FOUND,
            StoreError::InvalidKey => StatusCode::BAD_REQUEST,
            StoreError::BadSignature(_) | StoreError::UrlExpired => StatusCode::FORBIDDEN,
            StoreError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError::new(status, err.to_string())
    }
}
