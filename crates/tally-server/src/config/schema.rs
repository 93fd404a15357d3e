use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use serde::Deserialize;
use tally_core::error::{Result, TallyError};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            server: ServerSection::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(TallyError::BadRequest(format!("unsupported config version: {}", self.version)));
        }
        self.server.validate()?;
        self.metrics.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// `host:port`, or `:port` for every interface.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            max_body_bytes: default_max_body_bytes(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_socket_addr()?;
        if !(1..=64 * 1024 * 1024).contains(&self.max_body_bytes) {
            return Err(TallyError::BadRequest(
                "server.max_body_bytes must be between 1 and 67108864".into(),
            ));
        }
        if !(1..=600_000).contains(&self.request_timeout_ms) {
            return Err(TallyError::BadRequest(
                "server.request_timeout_ms must be between 1 and 600000".into(),
            ));
        }
        Ok(())
    }

    /// Parse `listen_address`. A bare `:8080` binds every interface on the
    /// IPv6 wildcard (dual-stack where the host allows it). No name lookup
    /// is done; hosts must be IP literals or `localhost`.
    pub fn listen_socket_addr(&self) -> Result<SocketAddr> {
        let addr = self.listen_address.trim();
        let invalid = |why: &str| TallyError::BadRequest(format!("invalid listen address {addr:?}: {why}"));

        if let Some(port) = addr.strip_prefix(':') {
            let port: u16 = port.parse().map_err(|_| invalid("bad port"))?;
            return Ok(SocketAddr::from((Ipv6Addr::UNSPECIFIED, port)));
        }
        if let Some(port) = addr.strip_prefix("localhost:") {
            let port: u16 = port.parse().map_err(|_| invalid("bad port"))?;
            return Ok(SocketAddr::from((Ipv4Addr::LOCALHOST, port)));
        }
        addr.parse().map_err(|_| invalid("expected ip:port or :port"))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Serve OpenMetrics when the scraper asks for it.
    #[serde(default = "default_enable_openmetrics")]
    pub enable_openmetrics: bool,

    #[serde(default = "default_duration_buckets")]
    pub duration_buckets: Vec<f64>,

    #[serde(default = "default_size_buckets")]
    pub size_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enable_openmetrics: default_enable_openmetrics(),
            duration_buckets: default_duration_buckets(),
            size_buckets: default_size_buckets(),
        }
    }
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<()> {
        check_buckets("metrics.duration_buckets", &self.duration_buckets)?;
        check_buckets("metrics.size_buckets", &self.size_buckets)?;
        Ok(())
    }
}

fn check_buckets(field: &str, b: &[f64]) -> Result<()> {
    if b.is_empty() {
        return Err(TallyError::BadRequest(format!("{field} must not be empty")));
    }
    if b.iter().any(|v| !v.is_finite()) {
        return Err(TallyError::BadRequest(format!("{field} must be finite")));
    }
    if b.windows(2).any(|w| w[0] >= w[1]) {
        return Err(TallyError::BadRequest(format!("{field} must be strictly increasing")));
    }
    Ok(())
}

fn default_version() -> u32 {
    1
}
fn default_listen_address() -> String {
    ":8080".into()
}
fn default_max_body_bytes() -> usize {
    1024 * 1024
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_enable_openmetrics() -> bool {
    true
}
fn default_duration_buckets() -> Vec<f64> {
    vec![0.00001, 0.0001, 0.001, 0.01, 0.1]
}
fn default_size_buckets() -> Vec<f64> {
    vec![200.0, 500.0, 900.0, 1500.0]
}
