//! Shared application state for the ingestion server.
//!
//! Owns the metrics registry and the two pipelines built on top of it:
//! - submit:   in-flight -> counter -> size -> deadline -> duration -> SubmitEndpoint
//! - bad path: bad-path counter -> NotFound

use std::sync::Arc;
use std::time::Duration;

use tally_core::error::Result;

use crate::config::ServerConfig;
use crate::ingest::{NotFound, SubmitEndpoint};
use crate::obs::ServerMetrics;
use crate::pipeline::{CountRequests, Deadline, InFlight, ObserveDuration, ObserveSize, Pipeline};

/// `handler` label of the duration histogram.
pub const SUBMIT_HANDLER: &str = "submit";

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: ServerConfig,
    metrics: Arc<ServerMetrics>,
    submit: Pipeline,
    bad_path: Pipeline,
}

impl AppState {
    /// Build application state with a fresh metrics registry.
    pub fn new(cfg: ServerConfig) -> Result<Self> {
        cfg.validate()?;
        let metrics = Arc::new(ServerMetrics::new(&cfg.metrics));
        Ok(Self::with_metrics(cfg, metrics))
    }

    /// Build application state around an existing registry.
    pub fn with_metrics(cfg: ServerConfig, metrics: Arc<ServerMetrics>) -> Self {
        let submit = submit_pipeline(&cfg, Arc::clone(&metrics));
        let bad_path = bad_path_pipeline(Arc::clone(&metrics));

        tracing::debug!(layers = ?submit.layer_names(), "submit pipeline built");

        Self {
            inner: Arc::new(AppStateInner {
                cfg,
                metrics,
                submit,
                bad_path,
            }),
        }
    }

    pub fn cfg(&self) -> &ServerConfig {
        &self.inner.cfg
    }

    pub fn metrics(&self) -> Arc<ServerMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    pub fn submit(&self) -> &Pipeline {
        &self.inner.submit
    }

    pub fn bad_path(&self) -> &Pipeline {
        &self.inner.bad_path
    }
}

/// The instrumented `/submit` chain. The in-flight gauge is outermost so it
/// brackets every inner layer; the body is read by the endpoint, under the
/// deadline.
pub fn submit_pipeline(cfg: &ServerConfig, metrics: Arc<ServerMetrics>) -> Pipeline {
    Pipeline::builder()
        .layer(InFlight::new(Arc::clone(&metrics)))
        .layer(CountRequests::submit(Arc::clone(&metrics)))
        .layer(ObserveSize::new(Arc::clone(&metrics)))
        .layer(Deadline::new(Duration::from_millis(cfg.server.request_timeout_ms)))
        .layer(ObserveDuration::new(metrics, SUBMIT_HANDLER))
        .endpoint(SubmitEndpoint)
}

pub fn bad_path_pipeline(metrics: Arc<ServerMetrics>) -> Pipeline {
    Pipeline::builder()
        .layer(CountRequests::bad_path(metrics))
        .endpoint(NotFound)
}
