//! One HTTP client, reused for every request of a run.

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;

use tally_core::Record;

use crate::config::ClientConfig;
use crate::error::SubmitError;

pub struct Submitter {
    http: reqwest::Client,
    submit_url: String,
    retries: u32,
    backoff: Duration,
}

impl Submitter {
    pub fn new(cfg: &ClientConfig) -> Result<Self, SubmitError> {
        cfg.validate()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()?;

        Ok(Self {
            http,
            submit_url: cfg.submit_url(),
            retries: cfg.retries,
            backoff: Duration::from_millis(cfg.backoff_ms),
        })
    }

    pub fn submit_url(&self) -> &str {
        &self.submit_url
    }

    /// `GET /submit`. Any status is an answer; only transport errors fail.
    pub async fn probe_unsupported_method(&self) -> Result<StatusCode, SubmitError> {
        let resp = self.http.get(&self.submit_url).send().await?;
        drain(resp).await
    }

    /// POST an encoded record with no `Content-Type` header.
    pub async fn submit_without_content_type(&self, record: &Record) -> Result<StatusCode, SubmitError> {
        let body = record.encode()?;
        let resp = self.http.post(&self.submit_url).body(body).send().await?;
        drain(resp).await
    }

    /// POST one record as JSON and require `200 OK`.
    ///
    /// Transport errors are retried `retries` times with exponential backoff;
    /// an unexpected status is returned at once.
    pub async fn submit(&self, record: &Record) -> Result<(), SubmitError> {
        let body = record.encode()?;
        let mut attempt: u32 = 0;
        loop {
            match self.post_json(body.clone()).await {
                Ok(status) if status == StatusCode::OK => return Ok(()),
                Ok(status) => return Err(SubmitError::UnexpectedStatus(status)),
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    let delay = self.backoff.saturating_mul(1u32 << attempt.min(16));
                    tracing::warn!(error = %e, attempt, delay_ms = delay.as_millis() as u64, "submit failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post_json(&self, body: Bytes) -> Result<StatusCode, SubmitError> {
        let resp = self
            .http
            .post(&self.submit_url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        drain(resp).await
    }
}

/// Read the reply to the end so the connection goes back to the pool.
async fn drain(resp: reqwest::Response) -> Result<StatusCode, SubmitError> {
    let status = resp.status();
    let body = resp.bytes().await?;
    if !status.is_success() && !body.is_empty() {
        tracing::debug!(%status, body = %String::from_utf8_lossy(&body), "error reply");
    }
    Ok(status)
}
