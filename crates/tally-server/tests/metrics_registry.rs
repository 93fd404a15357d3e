//! Registry accounting and exposition rendering.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use tally_server::config::MetricsConfig;
use tally_server::obs::{CounterVec, Format, HistogramVec, ServerMetrics};

#[test]
fn counter_label_order_does_not_split_series() {
    let c = CounterVec::default();
    c.inc(&[("code", "200"), ("method", "post")]);
    c.inc(&[("method", "post"), ("code", "200")]);
    c.add(&[("code", "400"), ("method", "post")], 3);

    assert_eq!(c.get(&[("code", "200"), ("method", "post")]), 2);
    assert_eq!(c.get(&[("code", "400"), ("method", "post")]), 3);
    assert_eq!(c.get(&[("code", "500"), ("method", "post")]), 0);
    assert_eq!(c.total(), 5);
}

#[test]
fn histogram_buckets_are_cumulative() {
    let h = HistogramVec::new(vec![200.0, 500.0, 900.0, 1500.0]);
    for v in [10.0, 200.0, 201.0, 1000.0, 5000.0] {
        h.observe(&[], v);
    }

    let snap = h.snapshot(&[]).unwrap();
    assert_eq!(snap.count, 5);
    assert_eq!(snap.sum, 6411.0);
    assert_eq!(
        snap.buckets,
        vec![(200.0, 2), (500.0, 3), (900.0, 3), (1500.0, 4)]
    );
}

#[test]
fn histogram_duration_in_seconds() {
    let h = HistogramVec::new(vec![0.00001, 0.0001, 0.001, 0.01, 0.1]);
    let labels = [("handler", "submit"), ("method", "post")];
    h.observe_duration(&labels, Duration::from_millis(5));

    let snap = h.snapshot(&labels).unwrap();
    assert_eq!(snap.count, 1);
    assert!((snap.sum - 0.005).abs() < 1e-9);
    let counts: Vec<u64> = snap.buckets.iter().map(|(_, c)| *c).collect();
    assert_eq!(counts, vec![0, 0, 0, 1, 1]);
}

#[test]
fn concurrent_increments_are_not_lost() {
    let metrics = Arc::new(ServerMetrics::new(&MetricsConfig::default()));
    let threads: Vec<_> = (0..8)
        .map(|_| {
            let m = Arc::clone(&metrics);
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    m.requests.inc(&[("code", "200"), ("method", "post")]);
                    m.request_size.observe(&[], 100.0);
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(metrics.requests.get(&[("code", "200"), ("method", "post")]), 8000);
    let snap = metrics.request_size.snapshot(&[]).unwrap();
    assert_eq!(snap.count, 8000);
    assert_eq!(snap.sum, 800_000.0);
}

#[test]
fn prometheus_text_rendering() {
    let metrics = ServerMetrics::new(&MetricsConfig::default());
    metrics.requests.inc(&[("code", "200"), ("method", "post")]);
    metrics.request_size.observe(&[], 120.0);
    metrics.bad_path.inc(&[("code", "404"), ("method", "get")]);

    let out = metrics.render(Format::Prometheus);

    assert!(out.contains("# HELP server_http_request_count The total number of requests by type\n"));
    assert!(out.contains("# TYPE server_http_request_count counter\n"));
    assert!(out.contains("server_http_request_count{code=\"200\",method=\"post\"} 1\n"));
    assert!(out.contains("# TYPE server_in_flight_requests gauge\nserver_in_flight_requests 0\n"));
    assert!(out.contains("server_request_size_bytes_bucket{le=\"200\"} 1\n"));
    assert!(out.contains("server_request_size_bytes_bucket{le=\"+Inf\"} 1\n"));
    assert!(out.contains("server_request_size_bytes_sum 120\n"));
    assert!(out.contains("server_request_size_bytes_count 1\n"));
    assert!(out.contains("server_http_request_badpath_count{code=\"404\",method=\"get\"} 1\n"));
    assert!(out.contains("# TYPE server_build_info gauge\n"));
    assert!(out.contains("process_start_time_seconds "));
    assert!(!out.contains("# EOF"));
}

#[test]
fn openmetrics_rendering() {
    let metrics = ServerMetrics::new(&MetricsConfig::default());
    metrics.requests.inc(&[("code", "200"), ("method", "post")]);
    metrics
        .duration
        .observe(&[("handler", "submit"), ("method", "post")], 0.00005);

    let out = metrics.render(Format::OpenMetrics);

    assert!(out.contains("# TYPE server_http_request_count counter\n"));
    assert!(out.contains("server_http_request_count_total{code=\"200\",method=\"post\"} 1\n"));
    assert!(out.contains(
        "server_request_duration_seconds_bucket{handler=\"submit\",method=\"post\",le=\"0.0001\"} 1\n"
    ));
    assert!(out.contains(
        "server_request_duration_seconds_bucket{handler=\"submit\",method=\"post\",le=\"0.00001\"} 0\n"
    ));
    assert!(out.ends_with("# EOF\n"));
}

#[test]
fn label_values_are_escaped() {
    let metrics = ServerMetrics::new(&MetricsConfig::default());
    metrics.bad_path.inc(&[("code", "404"), ("method", "we\"ird\\")]);

    let out = metrics.render(Format::Prometheus);
    assert!(out.contains("method=\"we\\\"ird\\\\\""));
}
