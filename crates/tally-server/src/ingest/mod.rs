//! Ingestion endpoints.
//!
//! - `SubmitEndpoint`: `POST /submit`, decode-and-drop of one `Record`.
//! - `NotFound`: terminal handler for every unknown path.

pub mod submit;

use async_trait::async_trait;
use axum::http::StatusCode;

use crate::pipeline::{Endpoint, Reply, Request};

pub use submit::SubmitEndpoint;

/// No-op endpoint behind the bad-path counter.
pub struct NotFound;

#[async_trait]
impl Endpoint for NotFound {
    async fn call(&self, req: Request) -> Reply {
        tracing::debug!(method = %req.method, path = %req.path, "request to unknown path");
        Reply::empty(StatusCode::NOT_FOUND)
    }
}
