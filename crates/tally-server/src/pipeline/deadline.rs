use std::time::Duration;

use async_trait::async_trait;
use tally_core::error::TallyError;

use super::{Middleware, Next, Reply, Request};

/// Bounds the inner chain; expiry answers 408.
pub struct Deadline {
    timeout: Duration,
}

impl Deadline {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Middleware for Deadline {
    fn name(&self) -> &'static str {
        "deadline"
    }

    async fn handle(&self, req: Request, next: Next<'_>) -> Reply {
        let path = req.path.clone();
        match tokio::time::timeout(self.timeout, next.run(req)).await {
            Ok(reply) => reply,
            Err(_) => {
                tracing::warn!(%path, timeout_ms = self.timeout.as_millis() as u64, "request deadline exceeded");
                Reply::from(TallyError::Timeout)
            }
        }
    }
}
