//! Axum router wiring.
//!
//! - `/submit`  : instrumented ingestion pipeline
//! - `/metrics` : exposition
//! - anything else goes through the bad-path pipeline

use axum::{
    routing::{any, get},
    Router,
};

use crate::{app_state::AppState, ops, transport};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/submit", any(transport::submit))
        .route("/metrics", get(ops::metrics))
        .fallback(transport::fallback)
        .with_state(state)
}
