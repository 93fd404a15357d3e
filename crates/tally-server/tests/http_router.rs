//! End-to-end router behaviour through `tower::ServiceExt::oneshot`.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::time::Duration;

use axum::{
    body::{to_bytes, Body, Bytes},
    http::{header, Request, StatusCode},
    Router,
};
use futures_util::{future::join_all, stream};
use tower::ServiceExt; // for `oneshot`

use tally_server::{app_state::AppState, config, router::build_router};

const GOOD: &str = r#"{"id":1,"message":"hi","sw_version":"1.0","fw_version":"1.0"}"#;

fn app() -> (Router, AppState) {
    let state = AppState::new(config::ServerConfig::default()).unwrap();
    (build_router(state.clone()), state)
}

fn submit(method: &str, content_type: Option<&str>, body: impl Into<Body>) -> Request<Body> {
    let mut b = Request::builder().method(method).uri("/submit");
    if let Some(ct) = content_type {
        b = b.header(header::CONTENT_TYPE, ct);
    }
    b.body(body.into()).unwrap()
}

async fn body_string(resp: axum::response::Response) -> String {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn well_formed_post_is_ok() {
    let (app, state) = app();
    let resp = app.oneshot(submit("POST", Some("application/json"), GOOD)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_string(resp).await.is_empty());
    let m = state.metrics();
    assert_eq!(m.requests.get(&[("code", "200"), ("method", "post")]), 1);
}

#[tokio::test]
async fn missing_content_type_is_accepted() {
    let (app, _) = app();
    let resp = app.oneshot(submit("POST", None, GOOD)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn json_content_type_with_charset_is_accepted() {
    let (app, _) = app();
    let resp = app
        .oneshot(submit("POST", Some("application/json; charset=utf-8"), GOOD))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn non_json_content_type_is_415() {
    let (app, _) = app();
    let resp = app.oneshot(submit("POST", Some("text/plain"), GOOD)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn get_is_405_and_counted_under_get() {
    let (app, state) = app();
    let resp = app.oneshot(submit("GET", None, Body::empty())).await.unwrap();

    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(resp.headers().get(header::ALLOW).unwrap(), "POST");
    let m = state.metrics();
    assert_eq!(m.requests.get(&[("code", "405"), ("method", "get")]), 1);
    assert_eq!(m.bad_path.total(), 0);
}

#[tokio::test]
async fn malformed_body_is_400_with_error_json() {
    let (app, state) = app();
    let resp = app
        .clone()
        .oneshot(submit("POST", Some("application/json"), r#"{"id":"not-an-int"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let v: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
    assert_eq!(v["error"], "BAD_REQUEST");

    // the server keeps serving after a decode failure
    let resp = app.oneshot(submit("POST", Some("application/json"), GOOD)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(state.metrics().in_flight.get(&[]), 0);
}

#[tokio::test]
async fn oversized_body_is_413() {
    let mut cfg = config::ServerConfig::default();
    cfg.server.max_body_bytes = 16;
    let state = AppState::new(cfg).unwrap();
    let app = build_router(state.clone());

    let req = Request::builder()
        .method("POST")
        .uri("/submit")
        .header(header::CONTENT_LENGTH, GOOD.len().to_string())
        .body(Body::from(GOOD))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let m = state.metrics();
    assert_eq!(m.requests.get(&[("code", "413"), ("method", "post")]), 1);
    assert_eq!(m.request_size.snapshot(&[]).unwrap().sum, GOOD.len() as f64);
}

#[tokio::test]
async fn unknown_path_counts_bad_path_once() {
    let (app, state) = app();
    for _ in 0..3 {
        let req = Request::builder().uri("/unknown").body(Body::empty()).unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    let m = state.metrics();
    assert_eq!(m.bad_path.get(&[("code", "404"), ("method", "get")]), 3);
    assert_eq!(m.requests.total(), 0);
    assert!(m.request_size.snapshot(&[]).is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_lose_no_updates() {
    const N: usize = 200;
    let (app, state) = app();

    let calls = (0..N).map(|i| {
        let app = app.clone();
        let body = if i % 4 == 0 { "nope" } else { GOOD };
        async move { app.oneshot(submit("POST", Some("application/json"), body)).await.unwrap().status() }
    });
    let handles: Vec<_> = calls.map(tokio::spawn).collect();
    let statuses: Vec<StatusCode> = join_all(handles).await.into_iter().map(|r| r.unwrap()).collect();

    let ok = statuses.iter().filter(|s| **s == StatusCode::OK).count();
    assert_eq!(ok, N - N / 4);

    let m = state.metrics();
    assert_eq!(m.requests.get(&[("code", "200"), ("method", "post")]), ok as u64);
    assert_eq!(m.requests.get(&[("code", "400"), ("method", "post")]), (N / 4) as u64);
    assert_eq!(m.in_flight.get(&[]), 0);
    assert_eq!(m.request_size.snapshot(&[]).unwrap().count, N as u64);
}

#[tokio::test]
async fn metrics_endpoint_serves_text_format() {
    let (app, _) = app();
    app.clone().oneshot(submit("POST", Some("application/json"), GOOD)).await.unwrap();

    let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/plain; version=0.0.4; charset=utf-8"
    );
    let text = body_string(resp).await;
    assert!(text.contains("server_http_request_count{code=\"200\",method=\"post\"} 1"));
    assert!(text.contains("server_request_duration_seconds_count{handler=\"submit\",method=\"post\"} 1"));
    // scrapes are neither submissions nor bad paths
    assert!(!text.contains("server_http_request_badpath_count{"));
}

#[tokio::test]
async fn metrics_endpoint_negotiates_openmetrics() {
    let (app, _) = app();
    let req = Request::builder()
        .uri("/metrics")
        .header(
            header::ACCEPT,
            "application/openmetrics-text;version=1.0.0,text/plain;version=0.0.4;q=0.5",
        )
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();

    assert_eq!(
        resp.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/openmetrics-text; version=1.0.0; charset=utf-8"
    );
    assert!(body_string(resp).await.ends_with("# EOF\n"));
}

#[tokio::test]
async fn openmetrics_can_be_disabled() {
    let mut cfg = config::ServerConfig::default();
    cfg.metrics.enable_openmetrics = false;
    let app = build_router(AppState::new(cfg).unwrap());

    let req = Request::builder()
        .uri("/metrics")
        .header(header::ACCEPT, "application/openmetrics-text")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(
        resp.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/plain; version=0.0.4; charset=utf-8"
    );
}

#[tokio::test]
async fn oversized_streamed_body_is_413() {
    let mut cfg = config::ServerConfig::default();
    cfg.server.max_body_bytes = 16;
    let state = AppState::new(cfg).unwrap();
    let app = build_router(state.clone());

    let raw = GOOD.as_bytes();
    let chunks = vec![
        Ok::<_, std::io::Error>(Bytes::from_static(&raw[..30])),
        Ok(Bytes::from_static(&raw[30..])),
    ];
    let req = Request::builder()
        .method("POST")
        .uri("/submit")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from_stream(stream::iter(chunks)))
        .unwrap();
    assert!(req.headers().get(header::CONTENT_LENGTH).is_none());

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(state.metrics().requests.get(&[("code", "413"), ("method", "post")]), 1);
}

#[tokio::test]
async fn slow_upload_is_in_flight_and_bounded_by_deadline() {
    let mut cfg = config::ServerConfig::default();
    cfg.server.request_timeout_ms = 50;
    let state = AppState::new(cfg).unwrap();
    let app = build_router(state.clone());

    let body = Body::from_stream(stream::once(async {
        tokio::time::sleep(Duration::from_millis(400)).await;
        Ok::<_, std::io::Error>(Bytes::from_static(GOOD.as_bytes()))
    }));
    let req = Request::builder()
        .method("POST")
        .uri("/submit")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .unwrap();

    let call = tokio::spawn(app.oneshot(req));
    tokio::time::sleep(Duration::from_millis(20)).await;
    let m = state.metrics();
    assert_eq!(m.in_flight.get(&[]), 1);

    let resp = call.await.unwrap().unwrap();
    assert_eq!(resp.status(), StatusCode::REQUEST_TIMEOUT);
    assert_eq!(m.in_flight.get(&[]), 0);
    assert_eq!(m.requests.get(&[("code", "408"), ("method", "post")]), 1);
    assert_eq!(m.request_size.snapshot(&[]).unwrap().count, 1);
}

#[tokio::test]
async fn extension_methods_fold_into_one_series() {
    let (app, state) = app();
    for i in 0..50 {
        let method = format!("X{i}");
        let resp = app.clone().oneshot(submit(&method, None, Body::empty())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    let m = state.metrics();
    assert_eq!(m.requests.get(&[("code", "405"), ("method", "unknown")]), 50);
    assert_eq!(m.requests.total(), 50);
}
