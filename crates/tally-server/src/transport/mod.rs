//! HTTP transport adapter.
//!
//! Converts axum requests into pipeline requests and pipeline replies back
//! into axum responses. The body stream is handed over unread, bounded by
//! `server.max_body_bytes`; the endpoint reads it inside the pipeline.

use axum::{
    body::Body,
    extract::{Request as HttpRequest, State},
    response::Response,
};

use crate::app_state::AppState;
use crate::pipeline::{Reply, Request};

pub fn into_pipeline_request(req: HttpRequest, limit: usize) -> Request {
    let (parts, body) = req.into_parts();
    let mut out = Request::new(parts.method, parts.uri.path())
        .with_body(body)
        .with_body_limit(limit);
    out.headers = parts.headers;
    out
}

pub fn into_response(reply: Reply) -> Response {
    let mut resp = Response::new(Body::from(reply.body));
    *resp.status_mut() = reply.status;
    *resp.headers_mut() = reply.headers;
    resp
}

/// `/submit`, any method; the endpoint itself answers 405 for non-POST.
pub async fn submit(State(app): State<AppState>, req: HttpRequest) -> Response {
    let req = into_pipeline_request(req, app.cfg().server.max_body_bytes);
    into_response(app.submit().handle(req).await)
}

/// Every path without a route. The body is never read.
pub async fn fallback(State(app): State<AppState>, req: HttpRequest) -> Response {
    let req = into_pipeline_request(req, app.cfg().server.max_body_bytes);
    into_response(app.bad_path().handle(req).await)
}
