//! The submission scenario: probes first, then the bulk loop.

use tally_core::Record;

use crate::config::{ClientConfig, OnError};
use crate::error::SubmitError;
use crate::submit::Submitter;

/// Outcome of the bulk loop.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
}

pub async fn run(cfg: &ClientConfig) -> Result<RunReport, SubmitError> {
    let submitter = Submitter::new(cfg)?;
    run_with(&submitter, cfg).await
}

pub async fn run_with(submitter: &Submitter, cfg: &ClientConfig) -> Result<RunReport, SubmitError> {
    tracing::info!(url = %submitter.submit_url(), count = cfg.count, "starting submission run");
    let template = Record::sample();

    match submitter.probe_unsupported_method().await {
        Ok(status) => tracing::info!(%status, "unsupported method probe answered"),
        Err(e) => tolerate(cfg.on_error, e, "unsupported method probe")?,
    }

    match submitter.submit_without_content_type(&template).await {
        Ok(status) => tracing::info!(%status, "submit without content-type answered"),
        Err(e) => tolerate(cfg.on_error, e, "submit without content-type")?,
    }

    let mut report = RunReport::default();
    for i in 0..cfg.count {
        let record = template.with_id(template.id.wrapping_add(i as i64));
        report.attempted += 1;

        match submitter.submit(&record).await {
            Ok(()) => report.succeeded += 1,
            Err(e) => {
                report.failed += 1;
                if cfg.on_error == OnError::Abort {
                    tracing::error!(
                        error = %e,
                        id = record.id,
                        attempted = report.attempted,
                        succeeded = report.succeeded,
                        "aborting run"
                    );
                    return Err(e);
                }
                tracing::warn!(error = %e, id = record.id, "submission failed");
            }
        }

        if cfg.progress_every > 0 && report.attempted % cfg.progress_every == 0 {
            tracing::info!(
                attempted = report.attempted,
                succeeded = report.succeeded,
                failed = report.failed,
                "progress"
            );
        }
    }

    tracing::info!(
        attempted = report.attempted,
        succeeded = report.succeeded,
        failed = report.failed,
        "submission run finished"
    );
    Ok(report)
}

fn tolerate(policy: OnError, e: SubmitError, step: &str) -> Result<(), SubmitError> {
    match policy {
        OnError::Abort => {
            tracing::error!(error = %e, step, "aborting run");
            Err(e)
        }
        OnError::Continue => {
            tracing::warn!(error = %e, step, "step failed, continuing");
            Ok(())
        }
    }
}
