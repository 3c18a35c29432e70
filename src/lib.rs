//! clipvault — video-hosting backend with a media ingestion pipeline.
//!
//! Uploads arrive as multipart HTTP requests, are staged to scratch storage,
//! probed and fast-start-rewritten when they are video, placed in an object
//! store under an aspect-bucketed key, and recorded in SQLite as a
//! `"bucket,key"` coordinate that is presigned on every read.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
