//! Transport-independent request pipeline.
//!
//! A `Pipeline` is an ordered list of `Middleware` ending in one `Endpoint`.
//! Each middleware receives the request plus a `Next` handle for the rest of
//! the chain and records its own signal around the call. The first layer
//! added is the outermost.
//!
//! Requests and replies here are plain values (method, path, headers, body
//! stream), so ordering and composition can be tested without a socket.

pub mod deadline;
pub mod instrument;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use serde_json::json;

use tally_core::error::{Result, TallyError};

pub use deadline::Deadline;
pub use instrument::{CountRequests, InFlight, ObserveDuration, ObserveSize};

/// Inbound request as seen by the pipeline.
///
/// The body is carried unread; the endpoint pulls it with `read_body`, so
/// upload time falls inside every layer that wraps the endpoint.
pub struct Request {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Body,
    /// Upper bound enforced by `read_body`.
    pub body_limit: usize,
    received: Arc<AtomicU64>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: Body::empty(),
            body_limit: usize::MAX,
            received: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_header(mut self, name: header::HeaderName, value: &'static str) -> Self {
        self.headers.insert(name, HeaderValue::from_static(value));
        self
    }

    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    fn declared_len(&self) -> Option<usize> {
        self.headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok())
    }

    /// Shared view of the body size, valid after the request has moved on.
    pub fn size_meter(&self) -> SizeMeter {
        SizeMeter {
            declared: self.declared_len().unwrap_or(0),
            received: Arc::clone(&self.received),
        }
    }

    /// Lower-case method name used as the `method` label. Extension
    /// methods share one series.
    pub fn method_label(&self) -> &'static str {
        match self.method.as_str() {
            "GET" => "get",
            "POST" => "post",
            "PUT" => "put",
            "DELETE" => "delete",
            "HEAD" => "head",
            "OPTIONS" => "options",
            "PATCH" => "patch",
            "CONNECT" => "connect",
            "TRACE" => "trace",
            _ => "unknown",
        }
    }

    /// Read the whole body, at most `body_limit` bytes.
    pub async fn read_body(&mut self) -> Result<Bytes> {
        let limit = self.body_limit;
        if self.declared_len().is_some_and(|n| n > limit) {
            return Err(TallyError::PayloadTooLarge);
        }

        let mut stream = std::mem::take(&mut self.body).into_data_stream();
        let mut buf = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| TallyError::BadRequest(format!("read body: {e}")))?;
            self.received.fetch_add(chunk.len() as u64, Ordering::Relaxed);
            if buf.len() + chunk.len() > limit {
                return Err(TallyError::PayloadTooLarge);
            }
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }
}

/// Body size for the request-size histogram: bytes received, or the declared
/// `Content-Length` when that is larger (oversized bodies are not read).
#[derive(Clone)]
pub struct SizeMeter {
    declared: usize,
    received: Arc<AtomicU64>,
}

impl SizeMeter {
    pub fn bytes(&self) -> usize {
        let received = self.received.load(Ordering::Relaxed) as usize;
        self.declared.max(received)
    }
}

/// Outbound reply produced by an endpoint.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Reply {
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }
}

impl From<TallyError> for Reply {
    fn from(err: TallyError) -> Self {
        let status = match err {
            TallyError::Decode(_) | TallyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            TallyError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            TallyError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            TallyError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            TallyError::Timeout => StatusCode::REQUEST_TIMEOUT,
            TallyError::Encode(_) | TallyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = json!({
            "error": err.client_code().as_str(),
            "message": err.to_string(),
        });

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self {
            status,
            headers,
            body: Bytes::from(body.to_string()),
        }
    }
}

/// Innermost handler of a pipeline.
#[async_trait]
pub trait Endpoint: Send + Sync {
    async fn call(&self, req: Request) -> Reply;
}

/// One layer around the rest of the pipeline.
#[async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;
    async fn handle(&self, req: Request, next: Next<'_>) -> Reply;
}

/// The remainder of the chain after the current middleware.
pub struct Next<'a> {
    layers: &'a [Arc<dyn Middleware>],
    endpoint: &'a dyn Endpoint,
}

impl<'a> Next<'a> {
    pub async fn run(self, req: Request) -> Reply {
        match self.layers.split_first() {
            Some((layer, rest)) => {
                let next = Next {
                    layers: rest,
                    endpoint: self.endpoint,
                };
                layer.handle(req, next).await
            }
            None => self.endpoint.call(req).await,
        }
    }
}

/// Adapts an async closure into an `Endpoint`.
pub struct FnEndpoint<F>(pub F);

#[async_trait]
impl<F, Fut> Endpoint for FnEndpoint<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Reply> + Send + 'static,
{
    async fn call(&self, req: Request) -> Reply {
        (self.0)(req).await
    }
}

#[derive(Clone)]
pub struct Pipeline {
    layers: Arc<[Arc<dyn Middleware>]>,
    endpoint: Arc<dyn Endpoint>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder { layers: Vec::new() }
    }

    pub async fn handle(&self, req: Request) -> Reply {
        let next = Next {
            layers: &self.layers,
            endpoint: self.endpoint.as_ref(),
        };
        next.run(req).await
    }

    /// Layer names, outermost first.
    pub fn layer_names(&self) -> Vec<&'static str> {
        self.layers.iter().map(|l| l.name()).collect()
    }
}

pub struct PipelineBuilder {
    layers: Vec<Arc<dyn Middleware>>,
}

impl PipelineBuilder {
    /// Append a layer inside the ones already added.
    pub fn layer(mut self, m: impl Middleware + 'static) -> Self {
        self.layers.push(Arc::new(m));
        self
    }

    pub fn endpoint(self, e: impl Endpoint + 'static) -> Pipeline {
        Pipeline {
            layers: self.layers.into(),
            endpoint: Arc::new(e),
        }
    }
}
