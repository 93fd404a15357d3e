//! HTTP instrumentation middleware.
//!
//! Four independent signals, each recorded around the rest of the chain:
//! in-flight gauge, request counter, request size, and handler duration.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::obs::{CounterVec, GaugeVec, ServerMetrics};

use super::{Middleware, Next, Reply, Request};

/// Tracks requests currently inside the wrapped chain.
pub struct InFlight {
    metrics: Arc<ServerMetrics>,
}

impl InFlight {
    pub fn new(metrics: Arc<ServerMetrics>) -> Self {
        Self { metrics }
    }
}

/// Decrements on drop: normal return, cancellation, or unwinding.
struct InFlightGuard<'a> {
    gauge: &'a GaugeVec,
}

impl<'a> InFlightGuard<'a> {
    fn enter(gauge: &'a GaugeVec) -> Self {
        gauge.inc(&[]);
        Self { gauge }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.gauge.dec(&[]);
    }
}

#[async_trait]
impl Middleware for InFlight {
    fn name(&self) -> &'static str {
        "in_flight"
    }

    async fn handle(&self, req: Request, next: Next<'_>) -> Reply {
        let _guard = InFlightGuard::enter(&self.metrics.in_flight);
        next.run(req).await
    }
}

/// Counts completed requests by final `code` and `method`.
pub struct CountRequests {
    metrics: Arc<ServerMetrics>,
    counter: fn(&ServerMetrics) -> &CounterVec,
    name: &'static str,
}

impl CountRequests {
    /// `server_http_request_count`.
    pub fn submit(metrics: Arc<ServerMetrics>) -> Self {
        Self {
            metrics,
            counter: requests_family,
            name: "count_requests",
        }
    }

    /// `server_http_request_badpath_count`.
    pub fn bad_path(metrics: Arc<ServerMetrics>) -> Self {
        Self {
            metrics,
            counter: bad_path_family,
            name: "count_bad_path",
        }
    }
}

fn requests_family(m: &ServerMetrics) -> &CounterVec {
    &m.requests
}

fn bad_path_family(m: &ServerMetrics) -> &CounterVec {
    &m.bad_path
}

#[async_trait]
impl Middleware for CountRequests {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn handle(&self, req: Request, next: Next<'_>) -> Reply {
        let method = req.method_label();
        let reply = next.run(req).await;
        (self.counter)(&self.metrics).inc(&[("code", reply.status.as_str()), ("method", method)]);
        reply
    }
}

/// Observes the request body size once the inner chain returns, including
/// when an inner deadline cut the call short.
pub struct ObserveSize {
    metrics: Arc<ServerMetrics>,
}

impl ObserveSize {
    pub fn new(metrics: Arc<ServerMetrics>) -> Self {
        Self { metrics }
    }
}

#[async_trait]
impl Middleware for ObserveSize {
    fn name(&self) -> &'static str {
        "observe_size"
    }

    async fn handle(&self, req: Request, next: Next<'_>) -> Reply {
        let size = req.size_meter();
        let reply = next.run(req).await;
        self.metrics.request_size.observe(&[], size.bytes() as f64);
        reply
    }
}

/// Observes wall-clock latency of the inner chain under a fixed handler name.
pub struct ObserveDuration {
    metrics: Arc<ServerMetrics>,
    handler: &'static str,
}

impl ObserveDuration {
    pub fn new(metrics: Arc<ServerMetrics>, handler: &'static str) -> Self {
        Self { metrics, handler }
    }
}

#[async_trait]
impl Middleware for ObserveDuration {
    fn name(&self) -> &'static str {
        "observe_duration"
    }

    async fn handle(&self, req: Request, next: Next<'_>) -> Reply {
        let method = req.method_label();
        let start = Instant::now();
        let reply = next.run(req).await;
        self.metrics
            .duration
            .observe_duration(&[("handler", self.handler), ("method", method)], start.elapsed());
        reply
    }
}
