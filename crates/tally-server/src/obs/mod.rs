//! Lightweight in-process metrics.
//!
//! Series are stored as atomics behind `DashMap` label maps and rendered by
//! the `/metrics` handler in Prometheus text or OpenMetrics format. The
//! registry is an ordinary value handed to the pipeline at construction time,
//! so tests can build as many isolated registries as they like.

pub mod metrics;

pub use metrics::{CounterVec, Format, GaugeVec, HistogramSnapshot, HistogramVec, ServerMetrics};
