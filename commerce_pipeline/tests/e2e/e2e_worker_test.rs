// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Queue-worker path over durable state: admission, consumption, idempotent
//! redelivery, dead-lettering with refund, and credit conservation.

use async_trait::async_trait;
use std::sync::Arc;

use commerce_pipeline::application::services::{
    JobService, SubmitJobRequest, WebhookService, WorkerService,
};
use commerce_pipeline::infrastructure::config::AppConfig;
use commerce_pipeline::infrastructure::metrics::MetricsService;
use commerce_pipeline::infrastructure::queue::SqliteJobQueue;
use commerce_pipeline::infrastructure::repositories::{SqliteCreditLedger, SqliteJobRepository};
use commerce_pipeline::infrastructure::runtime::StackExecutor;
use commerce_pipeline_bootstrap::ShutdownCoordinator;
use commerce_pipeline_domain::repositories::job_queue::MAX_ATTEMPTS;
use commerce_pipeline_domain::{
    CallbackTransport, JobConfig, JobQueue, JobStatus, JobStore, PipelineError, QueueDelivery,
};

use crate::common::{build_runtime, memory_pool, staging_video};

struct NullTransport;

#[async_trait]
impl CallbackTransport for NullTransport {
    async fn post(
        &self,
        _url: &str,
        _body: &[u8],
        _headers: &[(String, String)],
    ) -> Result<u16, PipelineError> {
        Ok(200)
    }
}

struct Harness {
    store: Arc<SqliteJobRepository>,
    queue: Arc<SqliteJobQueue>,
    ledger: Arc<SqliteCreditLedger>,
    jobs: Arc<JobService>,
    worker: WorkerService,
    _tmp: tempfile::TempDir,
    tmp_path: std::path::PathBuf,
}

async fn harness() -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let pool = memory_pool().await;
    let store = Arc::new(SqliteJobRepository::new(pool.clone()));
    let queue = Arc::new(SqliteJobQueue::new(pool.clone()));
    let ledger = Arc::new(SqliteCreditLedger::new(pool));
    ledger.grant("user-1", 100).await.unwrap();

    let webhook = Arc::new(WebhookService::new(Arc::new(NullTransport), "secret"));
    let jobs = Arc::new(JobService::new(
        store.clone(),
        queue.clone(),
        ledger.clone(),
        webhook,
    ));

    let (processors, providers, _) = build_runtime();
    let executor = Arc::new(StackExecutor::new(processors));

    let config = AppConfig {
        work_root: tmp.path().join("work"),
        blob_root: tmp.path().join("blobs"),
        retain_failed_sandboxes: true,
        ..AppConfig::default()
    };

    let worker = WorkerService::new(
        store.clone(),
        queue.clone(),
        jobs.clone(),
        executor,
        providers,
        Arc::new(MetricsService::new().unwrap()),
        config,
    );

    let tmp_path = tmp.path().to_path_buf();
    Harness {
        store,
        queue,
        ledger,
        jobs,
        worker,
        _tmp: tmp,
        tmp_path,
    }
}

#[tokio::test]
async fn test_worker_completes_quick_test_job() {
    let hx = harness().await;
    let video = staging_video(&hx.tmp_path, 20, false, None);

    let job = hx
        .jobs
        .submit(SubmitJobRequest {
            user_id: "user-1".into(),
            video_url: video.to_string_lossy().into_owned(),
            stack_id: "quick_test".into(),
            config: JobConfig::default(),
            callback_url: None,
            api_key_id: None,
        })
        .await
        .unwrap();
    let cost = JobService::estimate_cost(&JobConfig::default());

    let shutdown = ShutdownCoordinator::default();
    let delivery = hx.queue.dequeue().await.unwrap().unwrap();
    hx.worker
        .process_delivery(delivery, &shutdown.token())
        .await
        .unwrap();

    let finished = hx.store.load(job.id()).await.unwrap();
    assert_eq!(finished.status(), JobStatus::Completed);
    let result = finished.result().unwrap();
    assert!(result.frames_analyzed >= 1);
    assert_eq!(result.variants_discovered, 0);
    assert_eq!(finished.progress().percentage, 100.0);
    assert!(finished.started_at().is_some());
    assert!(finished.completed_at().is_some());

    // Credits committed: the hold stays spent.
    assert_eq!(hx.ledger.balance("user-1").await.unwrap(), 100 - cost);

    // The sandbox of a successful job is removed.
    assert!(!hx
        .tmp_path
        .join("work")
        .join(job.id().to_string())
        .exists());
}

#[tokio::test]
async fn test_redelivered_terminal_job_acks_idempotently() {
    let hx = harness().await;
    let video = staging_video(&hx.tmp_path, 10, false, None);

    let job = hx
        .jobs
        .submit(SubmitJobRequest {
            user_id: "user-1".into(),
            video_url: video.to_string_lossy().into_owned(),
            stack_id: "quick_test".into(),
            config: JobConfig::default(),
            callback_url: None,
            api_key_id: None,
        })
        .await
        .unwrap();

    let shutdown = ShutdownCoordinator::default();
    let delivery = hx.queue.dequeue().await.unwrap().unwrap();
    hx.worker
        .process_delivery(delivery.clone(), &shutdown.token())
        .await
        .unwrap();
    let first = hx.store.load(job.id()).await.unwrap();

    // Simulate redelivery of the same message after the job settled.
    hx.worker
        .process_delivery(delivery, &shutdown.token())
        .await
        .unwrap();

    let second = hx.store.load(job.id()).await.unwrap();
    assert_eq!(second.status(), first.status());
    assert_eq!(second.result(), first.result());
    assert_eq!(second.completed_at(), first.completed_at());
}

#[tokio::test]
async fn test_exhausted_attempts_fail_job_and_refund() {
    let hx = harness().await;
    // The input file exists at admission and vanishes before processing.
    let video = staging_video(&hx.tmp_path, 10, false, None);

    let job = hx
        .jobs
        .submit(SubmitJobRequest {
            user_id: "user-1".into(),
            video_url: video.to_string_lossy().into_owned(),
            stack_id: "quick_test".into(),
            config: JobConfig::default(),
            callback_url: None,
            api_key_id: None,
        })
        .await
        .unwrap();
    std::fs::remove_file(&video).unwrap();

    let shutdown = ShutdownCoordinator::default();
    let claimed = hx.queue.dequeue().await.unwrap().unwrap();
    // Final attempt: the queue dead-letters on failure.
    let last_attempt = QueueDelivery {
        attempt: MAX_ATTEMPTS,
        ..claimed
    };
    hx.worker
        .process_delivery(last_attempt, &shutdown.token())
        .await
        .unwrap();

    let failed = hx.store.load(job.id()).await.unwrap();
    assert_eq!(failed.status(), JobStatus::Failed);
    assert!(failed.error().is_some());

    // The reservation was refunded exactly once.
    assert_eq!(hx.ledger.balance("user-1").await.unwrap(), 100);

    // The dead message is not redelivered.
    assert!(hx.queue.dequeue().await.unwrap().is_none());
}

#[tokio::test]
async fn test_transient_failure_schedules_retry_without_terminal_state() {
    let hx = harness().await;
    let video = staging_video(&hx.tmp_path, 10, false, None);

    let job = hx
        .jobs
        .submit(SubmitJobRequest {
            user_id: "user-1".into(),
            video_url: video.to_string_lossy().into_owned(),
            stack_id: "quick_test".into(),
            config: JobConfig::default(),
            callback_url: None,
            api_key_id: None,
        })
        .await
        .unwrap();
    std::fs::remove_file(&video).unwrap();

    let shutdown = ShutdownCoordinator::default();
    let delivery = hx.queue.dequeue().await.unwrap().unwrap();
    assert_eq!(delivery.attempt, 1);
    hx.worker
        .process_delivery(delivery, &shutdown.token())
        .await
        .unwrap();

    // Attempt budget not exhausted: the job stays non-terminal for the
    // retry, and the hold stays in place.
    let pending = hx.store.load(job.id()).await.unwrap();
    assert!(!pending.status().is_terminal());
    let cost = JobService::estimate_cost(&JobConfig::default());
    assert_eq!(hx.ledger.balance("user-1").await.unwrap(), 100 - cost);
}
