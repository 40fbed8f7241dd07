// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Worker Service
//!
//! The queue consumer: claim a delivery, load the durable job, resume
//! idempotently (terminal jobs ack immediately), build the sandbox and
//! processor context, drive the stack executor, and hand the outcome to the
//! job service for terminal bookkeeping.
//!
//! Progress updates flow through a throttled writer that coalesces bursts
//! within a 200 ms window before touching the database, maps processor
//! status keys onto (monotonic) job status transitions, and is drained
//! before finalization so terminal writes never race progress writes.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use commerce_pipeline_bootstrap::ShutdownToken;
use commerce_pipeline_domain::{
    CancellationToken, Job, JobProgress, JobQueue, JobResult, JobStatus, JobStore, PipelineData,
    PipelineError, ProcessorContext, ProgressSink, ProgressUpdate, ProviderRegistry, QueueDelivery,
    StackConfig, WorkDirs,
};

use crate::application::services::job_service::JobService;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::metrics::MetricsService;
use crate::infrastructure::runtime::stack_executor::StackExecutor;
use crate::infrastructure::templates;

const PROGRESS_WINDOW: Duration = Duration::from_millis(200);

/// Queue-driven job execution.
pub struct WorkerService {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn JobQueue>,
    jobs: Arc<JobService>,
    executor: Arc<StackExecutor>,
    providers: Arc<ProviderRegistry>,
    metrics: Arc<MetricsService>,
    config: AppConfig,
}

impl WorkerService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn JobStore>,
        queue: Arc<dyn JobQueue>,
        jobs: Arc<JobService>,
        executor: Arc<StackExecutor>,
        providers: Arc<ProviderRegistry>,
        metrics: Arc<MetricsService>,
        config: AppConfig,
    ) -> Self {
        Self {
            store,
            queue,
            jobs,
            executor,
            providers,
            metrics,
            config,
        }
    }

    /// Consume loop; returns when the shutdown token fires.
    pub async fn run(&self, shutdown: ShutdownToken) -> Result<(), PipelineError> {
        let poll_interval = Duration::from_millis(self.config.queue.poll_interval_ms);
        let sweep_interval = Duration::from_secs(self.config.queue.retention_sweep_interval_secs);
        let mut last_sweep = Instant::now();

        info!("worker started");
        while !shutdown.is_cancelled() {
            if last_sweep.elapsed() >= sweep_interval {
                if let Err(e) = self.queue.sweep_retention().await {
                    warn!(error = %e, "queue retention sweep failed");
                }
                last_sweep = Instant::now();
            }

            match self.queue.dequeue().await {
                Ok(Some(delivery)) => {
                    if let Err(e) = self.process_delivery(delivery, &shutdown).await {
                        error!(error = %e, "delivery processing failed");
                    }
                }
                Ok(None) => {
                    tokio::select! {
                        _ = tokio::time::sleep(poll_interval) => {}
                        _ = shutdown.cancelled() => {}
                    }
                }
                Err(e) => {
                    error!(error = %e, "queue dequeue failed");
                    tokio::time::sleep(poll_interval).await;
                }
            }
        }
        info!("worker stopped");
        Ok(())
    }

    /// Handles one claimed delivery end to end.
    pub async fn process_delivery(
        &self,
        delivery: QueueDelivery,
        shutdown: &ShutdownToken,
    ) -> Result<(), PipelineError> {
        let mut job = match self.store.load(&delivery.job_id).await {
            Ok(job) => job,
            Err(PipelineError::JobNotFound(_)) => {
                warn!(job = %delivery.job_id, "queue message for unknown job; dropping");
                return self.queue.ack(&delivery).await;
            }
            Err(e) => return Err(e),
        };

        // Idempotent redelivery: a terminal job is already settled.
        if job.status().is_terminal() {
            info!(job = %job.id(), status = %job.status().as_str(), "redelivered terminal job; ack");
            return self.queue.ack(&delivery).await;
        }

        let started = Instant::now();
        let cancel = CancellationToken::new();
        let watcher = {
            let shutdown = shutdown.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                shutdown.cancelled().await;
                cancel.cancel();
            })
        };

        let run = self.run_job(&job, cancel).await;
        watcher.abort();
        let duration = started.elapsed().as_secs_f64();

        // Pick up the state the progress writer persisted (status, progress,
        // started_at) before terminal bookkeeping overwrites the row.
        if let Ok(fresh) = self.store.load(&delivery.job_id).await {
            job = fresh;
        }

        match run {
            Ok((data, work_dirs)) => {
                let result = JobResult::summarize(&data);
                self.jobs.finalize_success(&mut job, result).await?;
                self.queue.ack(&delivery).await?;
                self.metrics.record_job("completed", duration);
                if let Err(e) = work_dirs.remove() {
                    warn!(job = %job.id(), error = %e, "sandbox cleanup failed");
                }
                Ok(())
            }
            Err(error) if error.is_cancellation() => {
                self.jobs.finalize_cancelled(&mut job).await?;
                self.queue.ack(&delivery).await?;
                self.metrics.record_job("cancelled", duration);
                Ok(())
            }
            Err(error) => {
                warn!(job = %job.id(), attempt = delivery.attempt, error = %error, "job attempt failed");
                let dead = self.queue.nack(&delivery, &error.to_string()).await?;
                if dead {
                    self.jobs.finalize_failure(&mut job, &error).await?;
                    self.metrics.record_job("failed", duration);
                    if !self.config.retain_failed_sandboxes {
                        let sandbox = WorkDirs::from_root(
                            self.config.work_root.join(job.id().to_string()),
                        );
                        if let Err(e) = sandbox.remove() {
                            warn!(job = %job.id(), error = %e, "sandbox cleanup failed");
                        }
                    }
                } else {
                    self.metrics.record_job("retried", duration);
                }
                Ok(())
            }
        }
    }

    async fn run_job(
        &self,
        job: &Job,
        cancel: CancellationToken,
    ) -> Result<(PipelineData, WorkDirs), PipelineError> {
        let template = templates::template_by_id(job.stack_id())
            .ok_or_else(|| PipelineError::StackNotFound(job.stack_id().to_string()))?;

        let work_dirs = WorkDirs::create(&self.config.work_root, job.id())?;
        let (progress, progress_task) = ProgressWriter::spawn(Arc::clone(&self.store), *job.id());

        let context = ProcessorContext::new(
            *job.id(),
            job.user_id(),
            job.config().clone(),
            work_dirs.clone(),
            Arc::clone(&self.providers),
        )
        .with_cancellation(cancel)
        .with_job_store(Arc::clone(&self.store))
        .with_progress_sink(progress);

        let blob_store = self.blob_store();
        let context = context.with_blob_store(blob_store);

        let outcome = self
            .executor
            .execute(
                &template,
                &StackConfig::default(),
                &context,
                PipelineData::for_video_source(job.video_url()),
            )
            .await;

        // Drop the context (and with it the last sink clone) so the writer
        // task drains its channel and exits before terminal bookkeeping.
        drop(context);
        progress_task.finish().await;

        let outcome = outcome?;
        for step in &outcome.timer.steps {
            self.metrics
                .record_step(&step.processor_id, step.duration.as_secs_f64());
        }

        // Keep the failed/cancelled sandbox when configured; the success
        // path removes it after finalization.
        Ok((outcome.data, work_dirs))
    }

    fn blob_store(&self) -> Arc<dyn commerce_pipeline_domain::BlobStore> {
        Arc::new(crate::infrastructure::storage::LocalBlobStore::new(
            self.config.blob_root.clone(),
            self.config.blob_base_url.clone(),
        ))
    }
}

/// Throttled progress writer: a sync sink feeding a coalescing DB task.
struct ProgressWriter {
    sender: mpsc::UnboundedSender<ProgressUpdate>,
}

/// Handle used to drain and stop the writer task.
pub struct ProgressWriterTask {
    handle: tokio::task::JoinHandle<()>,
}

impl ProgressWriterTask {
    /// Awaits the writer task. The channel closes when the last sink clone
    /// drops, so callers drop the processor context first.
    pub async fn finish(self) {
        let _ = self.handle.await;
    }
}

impl ProgressWriter {
    fn spawn(
        store: Arc<dyn JobStore>,
        job_id: commerce_pipeline_domain::JobId,
    ) -> (Arc<dyn ProgressSink>, ProgressWriterTask) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<ProgressUpdate>();
        let handle = tokio::spawn(async move {
            let mut last_write: Option<Instant> = None;
            while let Some(mut update) = receiver.recv().await {
                // Coalesce the burst; the latest snapshot wins.
                while let Ok(newer) = receiver.try_recv() {
                    update = newer;
                }
                if let Some(written) = last_write {
                    let elapsed = written.elapsed();
                    if elapsed < PROGRESS_WINDOW {
                        tokio::time::sleep(PROGRESS_WINDOW - elapsed).await;
                        while let Ok(newer) = receiver.try_recv() {
                            update = newer;
                        }
                    }
                }
                if let Err(e) = write_progress(store.as_ref(), &job_id, update).await {
                    warn!(job = %job_id, error = %e, "progress write failed");
                }
                last_write = Some(Instant::now());
            }
        });
        (
            Arc::new(Self { sender }) as Arc<dyn ProgressSink>,
            ProgressWriterTask { handle },
        )
    }
}

impl ProgressSink for ProgressWriter {
    fn publish(&self, update: ProgressUpdate) {
        let _ = self.sender.send(update);
    }
}

async fn write_progress(
    store: &dyn JobStore,
    job_id: &commerce_pipeline_domain::JobId,
    update: ProgressUpdate,
) -> Result<(), PipelineError> {
    let mut job = store.load(job_id).await?;
    if job.status().is_terminal() {
        return Ok(());
    }

    // Known status keys advance the job status; others (e.g. "finalizing")
    // only show up in the progress snapshot.
    if let Ok(status) = JobStatus::parse(&update.status_key) {
        if !status.is_terminal() && job.status().can_transition_to(status) {
            job.transition_to(status)?;
        }
    }

    job.record_progress(JobProgress {
        step: update.status_key,
        percentage: update.percentage,
        frames_extracted: update.frames_extracted,
        frames_scored: update.frames_scored,
        variants_discovered: update.variants_discovered,
        images_generated: update.images_generated,
        total_steps: update.total_steps,
        current_step: update.current_step,
        message: update.message,
    });
    store.save(&job).await
}
