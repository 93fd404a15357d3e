//! Shared error type across tally crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input / malformed record.
    BadRequest,
    /// HTTP method not accepted by the endpoint.
    MethodNotAllowed,
    /// Content-Type present but not JSON.
    UnsupportedMediaType,
    /// Payload too large.
    PayloadTooLarge,
    /// Handler exceeded its deadline.
    Timeout,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            ClientCode::UnsupportedMediaType => "UNSUPPORTED_MEDIA_TYPE",
            ClientCode::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ClientCode::Timeout => "TIMEOUT",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, TallyError>;

/// Unified error type used by core, server and client.
#[derive(Debug, Error)]
pub enum TallyError {
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("timeout")]
    Timeout,
    #[error("internal: {0}")]
    Internal(String),
}

impl TallyError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            TallyError::Decode(_) | TallyError::BadRequest(_) => ClientCode::BadRequest,
            TallyError::MethodNotAllowed(_) => ClientCode::MethodNotAllowed,
            TallyError::UnsupportedMediaType(_) => ClientCode::UnsupportedMediaType,
            TallyError::PayloadTooLarge => ClientCode::PayloadTooLarge,
            TallyError::Timeout => ClientCode::Timeout,
            TallyError::Encode(_) | TallyError::Internal(_) => ClientCode::Internal,
        }
    }
}
