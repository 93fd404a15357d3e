//! Metrics registry for the ingestion server.
//!
//! Counter/gauge/histogram types with dynamic labels backed by `DashMap`.
//! Labels are flattened into sorted key vectors so the same label set always
//! maps to the same series regardless of argument order. Histogram bucket
//! bounds are `f64` and configured per family; sums are kept as `f64` bit
//! patterns updated with compare-and-swap.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::config::MetricsConfig;

pub const REQUEST_COUNT: &str = "server_http_request_count";
pub const BAD_PATH_COUNT: &str = "server_http_request_badpath_count";
pub const IN_FLIGHT: &str = "server_in_flight_requests";
pub const REQUEST_DURATION: &str = "server_request_duration_seconds";
pub const REQUEST_SIZE: &str = "server_request_size_bytes";

type LabelKey = Vec<(String, String)>;

/// Exposition format selected for one scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Prometheus text format 0.0.4.
    Prometheus,
    /// OpenMetrics 1.0.0 text format.
    OpenMetrics,
}

impl Format {
    pub fn content_type(self) -> &'static str {
        match self {
            Format::Prometheus => "text/plain; version=0.0.4; charset=utf-8",
            Format::OpenMetrics => "application/openmetrics-text; version=1.0.0; charset=utf-8",
        }
    }
}

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

/// `{k="v",...}` or an empty string for the unlabeled series.
fn label_block(key: &LabelKey, extra: Option<(&str, &str)>) -> String {
    let mut parts: Vec<String> = key
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect();
    if let Some((k, v)) = extra {
        parts.push(format!("{}=\"{}\"", k, escape_label(v)));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", parts.join(","))
    }
}

/// Float rendering. OpenMetrics wants integral values spelled as floats.
fn fmt_float(v: f64, format: Format) -> String {
    if v.is_infinite() {
        return if v > 0.0 { "+Inf".into() } else { "-Inf".into() };
    }
    if v.is_nan() {
        return "NaN".into();
    }
    if format == Format::OpenMetrics && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

fn write_header(out: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} {}", name, kind);
}

/// Series sorted by label key, for stable output.
fn sorted_series<V, T>(map: &DashMap<LabelKey, V>, read: impl Fn(&V) -> T) -> Vec<(LabelKey, T)> {
    let mut rows: Vec<(LabelKey, T)> = map.iter().map(|r| (r.key().clone(), read(r.value()))).collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    rows
}

fn add_f64(cell: &AtomicU64, v: f64) {
    let mut cur = cell.load(Ordering::Relaxed);
    loop {
        let next = (f64::from_bits(cur) + v).to_bits();
        match cell.compare_exchange_weak(cur, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return,
            Err(actual) => cur = actual,
        }
    }
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<LabelKey, AtomicU64>,
}

impl CounterVec {
    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    /// Increment by an arbitrary value.
    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        let counter = self.map.entry(label_key(labels)).or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    /// Current value of one series (0 when it was never touched).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Sum over every series.
    pub fn total(&self) -> u64 {
        self.map.iter().map(|r| r.value().load(Ordering::Relaxed)).sum()
    }

    fn render(&self, name: &str, help: &str, format: Format, out: &mut String) {
        write_header(out, name, help, "counter");
        let sample = match format {
            Format::Prometheus => name.to_string(),
            Format::OpenMetrics => format!("{name}_total"),
        };
        for (key, val) in sorted_series(&self.map, |c| c.load(Ordering::Relaxed)) {
            let _ = writeln!(out, "{}{} {}", sample, label_block(&key, None), val);
        }
    }
}

#[derive(Default)]
pub struct GaugeVec {
    map: DashMap<LabelKey, AtomicI64>,
}

impl GaugeVec {
    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) { self.add(labels, 1); }
    /// Decrement by 1.
    pub fn dec(&self, labels: &[(&str, &str)]) { self.add(labels, -1); }

    /// Add an arbitrary signed delta.
    pub fn add(&self, labels: &[(&str, &str)], v: i64) {
        let gauge = self.map.entry(label_key(labels)).or_insert_with(|| AtomicI64::new(0));
        gauge.fetch_add(v, Ordering::Relaxed);
    }

    pub fn get(&self, labels: &[(&str, &str)]) -> i64 {
        self.map
            .get(&label_key(labels))
            .map(|g| g.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, help: &str, _format: Format, out: &mut String) {
        write_header(out, name, help, "gauge");
        for (key, val) in sorted_series(&self.map, |g| g.load(Ordering::Relaxed)) {
            let _ = writeln!(out, "{}{} {}", name, label_block(&key, None), val);
        }
    }
}

struct AtomicHistogram {
    count: AtomicU64,
    sum_bits: AtomicU64,
    buckets: Box<[AtomicU64]>,
}

impl AtomicHistogram {
    fn new(n: usize) -> Self {
        Self {
            count: AtomicU64::new(0),
            sum_bits: AtomicU64::new(0f64.to_bits()),
            buckets: (0..n).map(|_| AtomicU64::new(0)).collect(),
        }
    }
}

/// Point-in-time copy of one histogram series.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub sum: f64,
    /// `(upper bound, cumulative count)` per configured bucket, `+Inf` excluded.
    pub buckets: Vec<(f64, u64)>,
}

pub struct HistogramVec {
    bounds: Vec<f64>,
    map: DashMap<LabelKey, AtomicHistogram>,
}

impl HistogramVec {
    /// Bounds must be finite and strictly increasing (checked by config validation).
    pub fn new(bounds: Vec<f64>) -> Self {
        Self { bounds, map: DashMap::new() }
    }

    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }

    /// Observe a value and increment cumulative buckets.
    pub fn observe(&self, labels: &[(&str, &str)], v: f64) {
        let n = self.bounds.len();
        let hist = self.map.entry(label_key(labels)).or_insert_with(|| AtomicHistogram::new(n));

        hist.count.fetch_add(1, Ordering::Relaxed);
        add_f64(&hist.sum_bits, v);

        // Cumulative: every bucket whose bound is >= v
        for (i, &le) in self.bounds.iter().enumerate() {
            if v <= le {
                hist.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Observe a duration in seconds.
    pub fn observe_duration(&self, labels: &[(&str, &str)], d: Duration) {
        self.observe(labels, d.as_secs_f64());
    }

    pub fn snapshot(&self, labels: &[(&str, &str)]) -> Option<HistogramSnapshot> {
        self.map.get(&label_key(labels)).map(|h| self.snapshot_of(&h))
    }

    fn snapshot_of(&self, h: &AtomicHistogram) -> HistogramSnapshot {
        HistogramSnapshot {
            count: h.count.load(Ordering::Relaxed),
            sum: f64::from_bits(h.sum_bits.load(Ordering::Relaxed)),
            buckets: self
                .bounds
                .iter()
                .zip(h.buckets.iter())
                .map(|(&le, c)| (le, c.load(Ordering::Relaxed)))
                .collect(),
        }
    }

    fn render(&self, name: &str, help: &str, format: Format, out: &mut String) {
        write_header(out, name, help, "histogram");
        for (key, snap) in sorted_series(&self.map, |h| self.snapshot_of(h)) {
            for (le, count) in &snap.buckets {
                let le = fmt_float(*le, format);
                let _ = writeln!(out, "{}_bucket{} {}", name, label_block(&key, Some(("le", &le))), count);
            }
            let _ = writeln!(out, "{}_bucket{} {}", name, label_block(&key, Some(("le", "+Inf"))), snap.count);

            let labels = label_block(&key, None);
            let _ = writeln!(out, "{}_sum{} {}", name, labels, fmt_float(snap.sum, format));
            let _ = writeln!(out, "{}_count{} {}", name, labels, snap.count);
        }
    }
}

/// Every series the server exports.
pub struct ServerMetrics {
    /// `code`, `method`; requests that reached `/submit`.
    pub requests: CounterVec,
    /// `code`, `method`; requests to any unknown path.
    pub bad_path: CounterVec,
    /// Unlabeled; requests currently inside the submit pipeline.
    pub in_flight: GaugeVec,
    /// `handler`, `method`; seconds.
    pub duration: HistogramVec,
    /// Unlabeled; body bytes.
    pub request_size: HistogramVec,
    started_wall: SystemTime,
    started: Instant,
}

impl ServerMetrics {
    pub fn new(cfg: &MetricsConfig) -> Self {
        let metrics = Self {
            requests: CounterVec::default(),
            bad_path: CounterVec::default(),
            in_flight: GaugeVec::default(),
            duration: HistogramVec::new(cfg.duration_buckets.clone()),
            request_size: HistogramVec::new(cfg.size_buckets.clone()),
            started_wall: SystemTime::now(),
            started: Instant::now(),
        };
        // the gauge is exported at 0 before the first request
        metrics.in_flight.add(&[], 0);
        metrics
    }

    /// Render all registered metrics followed by the process collectors.
    pub fn render(&self, format: Format) -> String {
        let mut out = String::new();
        self.requests.render(REQUEST_COUNT, "The total number of requests by type", format, &mut out);
        self.in_flight.render(
            IN_FLIGHT,
            "A gauge of requests currently being served by the wrapped handler.",
            format,
            &mut out,
        );
        self.duration.render(REQUEST_DURATION, "A histogram of latencies for requests.", format, &mut out);
        self.request_size.render(REQUEST_SIZE, "A histogram of request sizes.", format, &mut out);
        self.bad_path.render(
            BAD_PATH_COUNT,
            "The total number of requests to an incorrect path",
            format,
            &mut out,
        );
        self.render_process(format, &mut out);

        if format == Format::OpenMetrics {
            out.push_str("# EOF\n");
        }
        out
    }

    fn render_process(&self, format: Format, out: &mut String) {
        write_header(out, "server_build_info", "Build information about the running server.", "gauge");
        let _ = writeln!(
            out,
            "server_build_info{{name=\"{}\",version=\"{}\"}} 1",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        );

        let start = self
            .started_wall
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        write_header(out, "process_start_time_seconds", "Start time of the process since unix epoch in seconds.", "gauge");
        let _ = writeln!(out, "process_start_time_seconds {}", fmt_float(start, format));

        write_header(out, "process_uptime_seconds", "Seconds since the metrics registry was created.", "gauge");
        let _ = writeln!(
            out,
            "process_uptime_seconds {}",
            fmt_float(self.started.elapsed().as_secs_f64(), format)
        );
    }
}
