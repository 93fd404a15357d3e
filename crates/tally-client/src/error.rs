use reqwest::StatusCode;
use tally_core::TallyError;
use thiserror::Error;

/// Failure of one submission (or of building the client).
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Connection failure, timeout, DNS failure.
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    /// Record could not be serialized.
    #[error("encode: {0}")]
    Encode(#[from] TallyError),
    /// Non-200 answer on the bulk path.
    #[error("unexpected status: {0}")]
    UnexpectedStatus(StatusCode),
    #[error("invalid config: {0}")]
    Config(String),
}

impl SubmitError {
    /// Only transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SubmitError::Transport(_))
    }
}
