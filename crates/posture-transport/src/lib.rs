//! Posture Transport - HTTP/JSON bridge between agents and the ingest server
//!
//! This crate provides:
//! - `SnapshotClient`: agent-side delivery with digest header and retries
//! - `build_router` / `serve`: the axum ingest and query API
//! - Wire types shared by both ends

pub mod rest_client;
pub mod server;
pub mod types;

pub use rest_client::{RestClientConfig, RestClientError, SnapshotClient};
pub use server::{build_router, serve, AppState, ServerError};
pub use types::*;
