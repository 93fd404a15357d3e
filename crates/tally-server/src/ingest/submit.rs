//! `POST /submit`.
//!
//! Order of checks: method, body read, content type, record decode. Every
//! failure becomes a client-error reply; nothing here can fail the process.

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};

use tally_core::error::{Result, TallyError};
use tally_core::Record;

use crate::pipeline::{Endpoint, Reply, Request};

pub struct SubmitEndpoint;

#[async_trait]
impl Endpoint for SubmitEndpoint {
    async fn call(&self, req: Request) -> Reply {
        match accept(req).await {
            Ok(record) => {
                tracing::debug!(
                    id = record.id,
                    sw_version = %record.sw_version,
                    fw_version = %record.fw_version,
                    "record accepted"
                );
                Reply::empty(StatusCode::OK)
            }
            Err(e) => {
                tracing::debug!(error = %e, "submit rejected");
                let not_allowed = matches!(e, TallyError::MethodNotAllowed(_));
                let mut reply = Reply::from(e);
                if not_allowed {
                    reply.headers.insert(header::ALLOW, HeaderValue::from_static("POST"));
                }
                reply
            }
        }
    }
}

/// Validate, read and decode one submission.
pub async fn accept(mut req: Request) -> Result<Record> {
    if req.method != Method::POST {
        return Err(TallyError::MethodNotAllowed(req.method.to_string()));
    }
    let body = req.read_body().await?;
    check_content_type(&req.headers)?;
    Record::decode(&body)
}

/// A missing Content-Type is accepted; a present one must name JSON.
fn check_content_type(headers: &HeaderMap) -> Result<()> {
    let Some(raw) = headers.get(header::CONTENT_TYPE) else {
        return Ok(());
    };
    let value = raw
        .to_str()
        .map_err(|_| TallyError::UnsupportedMediaType("non-ascii content-type".into()))?;

    let essence = value.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    if essence == "application/json" || essence.ends_with("+json") {
        Ok(())
    } else {
        Err(TallyError::UnsupportedMediaType(essence))
    }
}
