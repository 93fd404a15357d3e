use clap::{Args, ValueEnum};
use reqwest::Url;

use crate::error::SubmitError;

/// What the bulk loop does after a failed submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OnError {
    /// Stop the run and return the error.
    Abort,
    /// Count the failure and keep going.
    Continue,
}

#[derive(Args, Clone, Debug)]
pub struct ClientConfig {
    /// Server base URL.
    #[arg(long, default_value = "http://localhost:8080", env = "TALLY_BASE_URL")]
    pub base_url: String,

    /// Number of well-formed records to submit.
    #[arg(long, default_value_t = 250_000)]
    pub count: u64,

    /// Extra attempts per submission after a transport error.
    #[arg(long, default_value_t = 0)]
    pub retries: u32,

    /// First retry delay; doubles on each further attempt.
    #[arg(long, default_value_t = 100)]
    pub backoff_ms: u64,

    /// Per-request timeout.
    #[arg(long, default_value_t = 5000)]
    pub timeout_ms: u64,

    #[arg(long, value_enum, default_value_t = OnError::Abort)]
    pub on_error: OnError,

    /// Log progress every N submissions (0 disables).
    #[arg(long, default_value_t = 10_000)]
    pub progress_every: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".into(),
            count: 250_000,
            retries: 0,
            backoff_ms: 100,
            timeout_ms: 5000,
            on_error: OnError::Abort,
            progress_every: 10_000,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), SubmitError> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| SubmitError::Config(format!("base_url {:?}: {e}", self.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SubmitError::Config(format!("base_url scheme must be http or https, got {}", url.scheme())));
        }
        if self.timeout_ms == 0 {
            return Err(SubmitError::Config("timeout_ms must be greater than 0".into()));
        }
        Ok(())
    }

    /// `{base_url}/submit`, tolerating a trailing slash on the base.
    pub fn submit_url(&self) -> String {
        format!("{}/submit", self.base_url.trim_end_matches('/'))
    }
}
