// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Job Lifecycle Service
//!
//! Admission, cancellation, and terminal bookkeeping.
//!
//! - **Admission** validates the input reference and configuration, reserves
//!   credits atomically, creates the row, and enqueues the job id. A failed
//!   reservation creates no row; a failed row creation refunds the hold.
//! - **Cancellation** is synchronous for `pending` jobs only (queue delete +
//!   row update); running jobs are reached cooperatively via their
//!   cancellation token, and jobs owned by another worker are rejected.
//! - **Finalization** performs exactly one of commit/refund per receipt
//!   (idempotent under `<job>:<event>` keys) and fires the optional
//!   callback.

use std::sync::Arc;
use tracing::{error, info};

use commerce_pipeline_domain::{
    CallbackPayload, CreditLedger, Job, JobConfig, JobId, JobQueue, JobResult, JobStatus,
    JobStore, PipelineError,
};

use crate::application::services::webhook_service::WebhookService;
use crate::infrastructure::templates;

/// Admission request.
#[derive(Debug, Clone)]
pub struct SubmitJobRequest {
    pub user_id: String,
    pub video_url: String,
    pub stack_id: String,
    pub config: JobConfig,
    pub callback_url: Option<String>,
    pub api_key_id: Option<String>,
}

/// Admission, cancellation, and terminal bookkeeping for jobs.
pub struct JobService {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn JobQueue>,
    credits: Arc<dyn CreditLedger>,
    webhook: Arc<WebhookService>,
}

impl JobService {
    pub fn new(
        store: Arc<dyn JobStore>,
        queue: Arc<dyn JobQueue>,
        credits: Arc<dyn CreditLedger>,
        webhook: Arc<WebhookService>,
    ) -> Self {
        Self {
            store,
            queue,
            credits,
            webhook,
        }
    }

    /// Cost of a job under the current policy constants. Pricing policy
    /// proper is external; this is the one place the amount is computed.
    pub fn estimate_cost(config: &JobConfig) -> i64 {
        5 + 2 * config.commercial_versions.len() as i64 + if config.ai_cleanup { 3 } else { 0 }
    }

    /// Validates and admits a job: reserve → create → enqueue.
    pub async fn submit(&self, request: SubmitJobRequest) -> Result<Job, PipelineError> {
        validate_input_reference(&request.video_url)?;
        if templates::template_by_id(&request.stack_id).is_none() {
            return Err(PipelineError::StackNotFound(request.stack_id.clone()));
        }

        let cost = Self::estimate_cost(&request.config);
        let receipt = self.credits.reserve(&request.user_id, cost).await?;

        let mut job = Job::new(
            request.user_id,
            request.video_url,
            request.stack_id,
            request.config,
        )?;
        job.attach_receipt(receipt.id);
        if let Some(url) = request.callback_url {
            job.set_callback_url(url);
        }
        if let Some(api_key_id) = request.api_key_id {
            job.set_api_key_id(api_key_id);
        }

        if let Err(create_error) = self.store.create(&job).await {
            // No row, no hold.
            let key = format!("{}:admission-rollback", job.id());
            if let Err(refund_error) = self.credits.refund(&receipt.id, &key).await {
                error!(job = %job.id(), error = %refund_error, "admission rollback refund failed");
            }
            return Err(create_error);
        }

        self.queue.enqueue(job.id()).await?;
        info!(job = %job.id(), stack = %job.stack_id(), cost, "job admitted");
        Ok(job)
    }

    /// Synchronously cancels a pending job. Non-pending jobs are rejected;
    /// running jobs must be cancelled cooperatively by their owning worker.
    pub async fn cancel(&self, job_id: &JobId) -> Result<Job, PipelineError> {
        let mut job = self.store.load(job_id).await?;
        match job.status() {
            JobStatus::Pending => {
                self.queue.remove_pending(job_id).await?;
                self.finalize_cancelled(&mut job).await?;
                Ok(job)
            }
            status if status.is_terminal() => Err(PipelineError::validation(format!(
                "job {} is already {}",
                job_id,
                status.as_str()
            ))),
            status => Err(PipelineError::validation(format!(
                "job {} is {}; only pending jobs can be cancelled synchronously",
                job_id,
                status.as_str()
            ))),
        }
    }

    /// Terminal bookkeeping for a successful run: commit the hold, save the
    /// result, fire the callback.
    pub async fn finalize_success(
        &self,
        job: &mut Job,
        result: JobResult,
    ) -> Result<(), PipelineError> {
        job.complete(result)?;
        self.store.save(job).await?;
        if let Some(receipt_id) = job.credit_receipt_id().copied() {
            let key = format!("{}:completed", job.id());
            self.credits.commit(&receipt_id, &key).await?;
        }
        self.send_callback(job).await;
        Ok(())
    }

    /// Terminal bookkeeping for a failed run: refund the hold, record the
    /// error sentence, fire the callback.
    pub async fn finalize_failure(
        &self,
        job: &mut Job,
        error: &PipelineError,
    ) -> Result<(), PipelineError> {
        job.fail(error.to_string())?;
        self.store.save(job).await?;
        self.refund(job, "failed").await;
        self.send_callback(job).await;
        Ok(())
    }

    /// Terminal bookkeeping for a cancelled run.
    pub async fn finalize_cancelled(&self, job: &mut Job) -> Result<(), PipelineError> {
        job.cancel()?;
        self.store.save(job).await?;
        self.refund(job, "cancelled").await;
        self.send_callback(job).await;
        Ok(())
    }

    async fn refund(&self, job: &Job, event: &str) {
        if let Some(receipt_id) = job.credit_receipt_id().copied() {
            let key = format!("{}:{}", job.id(), event);
            if let Err(error) = self.credits.refund(&receipt_id, &key).await {
                // The ledger rejects double-finalization; surface but do not
                // overwrite the job's terminal state.
                error!(job = %job.id(), error = %error, "credit refund failed");
            }
        }
    }

    async fn send_callback(&self, job: &Job) {
        let Some(url) = job.callback_url() else {
            return;
        };
        let payload = CallbackPayload {
            job_id: *job.id(),
            status: job.status(),
            result: job.result().cloned(),
            error: job.error().map(str::to_string),
        };
        if let Err(error) = self.webhook.notify(url, &payload).await {
            error!(job = %job.id(), error = %error, "callback serialization failed");
        }
    }
}

/// Accepts HTTP(S) URLs and existing local paths.
fn validate_input_reference(reference: &str) -> Result<(), PipelineError> {
    if reference.is_empty() {
        return Err(PipelineError::validation("video reference cannot be empty"));
    }
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return Ok(());
    }
    if std::path::Path::new(reference).is_file() {
        return Ok(());
    }
    Err(PipelineError::validation(format!(
        "video reference '{}' is neither an http(s) URL nor an existing file",
        reference
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_cost_scales_with_versions_and_cleanup() {
        let mut config = JobConfig::default();
        config.commercial_versions = BTreeSet::new();
        config.ai_cleanup = false;
        assert_eq!(JobService::estimate_cost(&config), 5);

        config.commercial_versions =
            BTreeSet::from(commerce_pipeline_domain::CommercialVersion::ALL);
        config.ai_cleanup = true;
        assert_eq!(JobService::estimate_cost(&config), 5 + 8 + 3);
    }

    #[test]
    fn test_input_reference_validation() {
        assert!(validate_input_reference("https://host/x.mp4").is_ok());
        assert!(validate_input_reference("http://host/x.mp4").is_ok());
        assert!(validate_input_reference("").is_err());
        assert!(validate_input_reference("/definitely/not/here.mp4").is_err());

        let tmp = tempfile::NamedTempFile::new().unwrap();
        assert!(validate_input_reference(tmp.path().to_str().unwrap()).is_ok());
    }
}
