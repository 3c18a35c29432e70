//! Service layer: authentication, metadata persistence, object storage,
//! external media tooling, and the upload pipeline that sequences them.

pub mod auth;
pub mod media_tool;
pub mod object_store;
pub mod pipeline;
pub mod videos;
