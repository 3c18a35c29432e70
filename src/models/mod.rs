//! Core data models for the video-hosting service.
//!
//! These entities represent video records and their stored-object coordinates.
//! They map cleanly to database tables via `sqlx::FromRow` and serialize
//! naturally as JSON via `serde`.

pub mod video;
