//! tally submission client.
//!
//! Exercises `/submit` the way a device fleet would: one unsupported-method
//! probe, one POST without `Content-Type`, then a bulk loop of well-formed
//! JSON submissions over a single pooled HTTP client.
//!
//! Every submission returns a `Result`; whether a failure aborts the run or is
//! counted and skipped is decided by `OnError`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod config;
pub mod error;
pub mod run;
pub mod submit;

pub use config::{ClientConfig, OnError};
pub use error::SubmitError;
pub use run::{run, run_with, RunReport};
pub use submit::Submitter;
