// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Processor Context
//!
//! Everything a processor needs beyond its data and options: job identity and
//! configuration, the filesystem sandbox, the provider registry, the
//! cancellation token, the execution timer, optional store ports, and the
//! progress sink. One context is built per executor invocation and shared
//! read-only by every step.

use std::sync::Arc;

use crate::entities::execution_timer::ExecutionTimer;
use crate::entities::job::JobConfig;
use crate::repositories::blob_store::BlobStore;
use crate::repositories::job_repository::JobStore;
use crate::services::provider_registry::ProviderRegistry;
use crate::value_objects::{CancellationToken, JobId, WorkDirs};
use crate::PipelineError;

/// Progress snapshot published by the executor after each step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressUpdate {
    /// Processor `status_key`, mapped to a job status by the lifecycle layer.
    pub status_key: String,
    /// Monotonically non-decreasing completion percentage.
    pub percentage: f32,
    pub current_step: u32,
    pub total_steps: u32,
    pub message: Option<String>,
    pub frames_extracted: Option<u32>,
    pub frames_scored: Option<u32>,
    pub variants_discovered: Option<u32>,
    pub images_generated: Option<u32>,
}

/// Consumer of progress updates. The job lifecycle layer implements this to
/// write (throttled) snapshots into the durable job record.
pub trait ProgressSink: Send + Sync {
    fn publish(&self, update: ProgressUpdate);
}

/// Execution context handed to every processor.
#[derive(Clone)]
pub struct ProcessorContext {
    job_id: JobId,
    user_id: String,
    config: JobConfig,
    work_dirs: WorkDirs,
    providers: Arc<ProviderRegistry>,
    cancellation: CancellationToken,
    timer: Arc<ExecutionTimer>,
    progress: Option<Arc<dyn ProgressSink>>,
    job_store: Option<Arc<dyn JobStore>>,
    blob_store: Option<Arc<dyn BlobStore>>,
}

impl ProcessorContext {
    /// Builds a context with the mandatory collaborators; optional ports are
    /// attached with the `with_*` builders.
    pub fn new(
        job_id: JobId,
        user_id: impl Into<String>,
        config: JobConfig,
        work_dirs: WorkDirs,
        providers: Arc<ProviderRegistry>,
    ) -> Self {
        Self {
            job_id,
            user_id: user_id.into(),
            config,
            work_dirs,
            providers,
            cancellation: CancellationToken::new(),
            timer: Arc::new(ExecutionTimer::new()),
            progress: None,
            job_store: None,
            blob_store: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn with_job_store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.job_store = Some(store);
        self
    }

    pub fn with_blob_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.blob_store = Some(store);
        self
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    pub fn work_dirs(&self) -> &WorkDirs {
        &self.work_dirs
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn timer(&self) -> &ExecutionTimer {
        &self.timer
    }

    /// Deterministic per-job seed for A/B variant selection.
    pub fn ab_seed(&self) -> String {
        self.job_id.to_string()
    }

    /// The job store, for processors that persist frame records.
    pub fn job_store(&self) -> Result<&Arc<dyn JobStore>, PipelineError> {
        self.job_store
            .as_ref()
            .ok_or_else(|| PipelineError::precondition("no job store configured for this run"))
    }

    /// The blob store, for processors that upload artifacts.
    pub fn blob_store(&self) -> Result<&Arc<dyn BlobStore>, PipelineError> {
        self.blob_store
            .as_ref()
            .ok_or_else(|| PipelineError::precondition("no blob store configured for this run"))
    }

    /// Publishes a progress update when a sink is attached.
    pub fn report_progress(&self, update: ProgressUpdate) {
        if let Some(sink) = &self.progress {
            sink.publish(update);
        }
    }

    /// Cancellation checkpoint; call at suspension points.
    pub fn check_cancelled(&self, during: &str) -> Result<(), PipelineError> {
        self.cancellation.check(during)
    }
}
