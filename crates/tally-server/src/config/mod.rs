//! Server config loader (strict parsing).

pub mod schema;

use std::fs;

use tally_core::error::{Result, TallyError};

pub use schema::{MetricsConfig, ServerConfig, ServerSection};

pub fn load_from_file(path: &str) -> Result<ServerConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| TallyError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ServerConfig> {
    let cfg: ServerConfig = serde_yaml::from_str(s)
        .map_err(|e| TallyError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
