//! tally core: the telemetry record model and the error surface shared by the
//! ingestion server and the submission client.
//!
//! This crate carries no transport or runtime dependencies so the record
//! contract can be reused on both sides of the wire.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Malformed input is
//! reported as `TallyError` so the server never crashes on bad traffic.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod record;

/// Shared result type.
pub use error::{Result, TallyError};
pub use record::Record;
