//! The unit of submitted telemetry.
//!
//! A `Record` lives for exactly one request/response exchange: the client
//! builds one per submission and the server decodes it and drops it.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TallyError};

/// One telemetry record as carried in the `/submit` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Opaque identifier; uniqueness is not enforced.
    pub id: i64,
    /// Free text.
    pub message: String,
    /// Software version tag.
    pub sw_version: String,
    /// Firmware version tag.
    pub fw_version: String,
}

impl Record {
    pub fn new(
        id: i64,
        message: impl Into<String>,
        sw_version: impl Into<String>,
        fw_version: impl Into<String>,
    ) -> Self {
        Self {
            id,
            message: message.into(),
            sw_version: sw_version.into(),
            fw_version: fw_version.into(),
        }
    }

    /// The record the demo client sends.
    pub fn sample() -> Self {
        Self::new(45934, "Something Wonderful Is Happening", "35.22.1.0", "306.C1.22")
    }

    /// Same payload under a different id.
    pub fn with_id(&self, id: i64) -> Self {
        Self { id, ..self.clone() }
    }

    /// Encode as a JSON object with all four fields.
    pub fn encode(&self) -> Result<Bytes> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|e| TallyError::Encode(format!("record json: {e}")))
    }

    /// Decode a JSON body. Missing fields and type mismatches are errors;
    /// unknown extra fields are ignored.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw).map_err(|e| TallyError::Decode(format!("invalid record json: {e}")))
    }
}
