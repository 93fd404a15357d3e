//! tally ingestion server library.
//!
//! Wires the transport adapter, the instrumented middleware pipeline, the
//! submit endpoint and the metrics registry into an axum router. Consumed by
//! the binary (`main.rs`) and by integration tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod app_state;
pub mod config;
pub mod ingest;
pub mod obs;
pub mod ops;
pub mod pipeline;
pub mod router;
pub mod transport;
