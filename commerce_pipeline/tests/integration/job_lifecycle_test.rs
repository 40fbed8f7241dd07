// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Job admission, cancellation, and credit-conservation behavior over the
//! real SQLite store, queue, and ledger.

use async_trait::async_trait;
use std::sync::Arc;

use commerce_pipeline::application::services::{JobService, SubmitJobRequest, WebhookService};
use commerce_pipeline::infrastructure::queue::SqliteJobQueue;
use commerce_pipeline::infrastructure::repositories::{SqliteCreditLedger, SqliteJobRepository};
use commerce_pipeline_domain::services::credit_service::CreditLedger;
use commerce_pipeline_domain::{
    CallbackTransport, JobConfig, JobQueue, JobResult, JobStatus, JobStore, PipelineError,
};

use crate::common::memory_pool;

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

struct Fixture {
    pool: sqlx::SqlitePool,
    store: Arc<SqliteJobRepository>,
    queue: Arc<SqliteJobQueue>,
    ledger: Arc<SqliteCreditLedger>,
    jobs: JobService,
}

async fn fixture(balance: i64) -> Fixture {
    let pool = memory_pool().await;
    let store = Arc::new(SqliteJobRepository::new(pool.clone()));
    let queue = Arc::new(SqliteJobQueue::new(pool.clone()));
    let ledger = Arc::new(SqliteCreditLedger::new(pool.clone()));
    ledger.grant("user-1", balance).await.unwrap();

    let webhook = Arc::new(WebhookService::new(Arc::new(NullTransport), "secret"));
    let jobs = JobService::new(
        store.clone(),
        queue.clone(),
        ledger.clone(),
        webhook,
    );
    Fixture {
        pool,
        store,
        queue,
        ledger,
        jobs,
    }
}

fn request() -> SubmitJobRequest {
    SubmitJobRequest {
        user_id: "user-1".into(),
        video_url: "https://host/x.mp4".into(),
        stack_id: "quick_test".into(),
        config: JobConfig::default(),
        callback_url: None,
        api_key_id: None,
    }
}

#[tokio::test]
async fn test_admission_creates_row_and_enqueues() {
    let fx = fixture(100).await;
    let job = fx.jobs.submit(request()).await.unwrap();

    let loaded = fx.store.load(job.id()).await.unwrap();
    assert_eq!(loaded.status(), JobStatus::Pending);
    assert!(loaded.credit_receipt_id().is_some());

    let delivery = fx.queue.dequeue().await.unwrap().unwrap();
    assert_eq!(&delivery.job_id, job.id());

    // The hold debited the balance.
    let cost = JobService::estimate_cost(&JobConfig::default());
    assert_eq!(fx.ledger.balance("user-1").await.unwrap(), 100 - cost);
}

#[tokio::test]
async fn test_failed_reservation_creates_no_job() {
    let fx = fixture(1).await;
    let error = fx.jobs.submit(request()).await.unwrap_err();
    assert!(matches!(error, PipelineError::InsufficientCredits(_)));

    assert!(fx.queue.dequeue().await.unwrap().is_none());
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
        .fetch_one(&fx.pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_unknown_stack_rejected_before_reservation() {
    let fx = fixture(100).await;
    let mut bad = request();
    bad.stack_id = "nope".into();
    let error = fx.jobs.submit(bad).await.unwrap_err();
    assert!(matches!(error, PipelineError::StackNotFound(_)));
    assert_eq!(fx.ledger.balance("user-1").await.unwrap(), 100);
}

#[tokio::test]
async fn test_pending_cancellation_removes_message_and_refunds() {
    let fx = fixture(100).await;
    let job = fx.jobs.submit(request()).await.unwrap();

    let cancelled = fx.jobs.cancel(job.id()).await.unwrap();
    assert_eq!(cancelled.status(), JobStatus::Cancelled);
    assert!(fx.queue.dequeue().await.unwrap().is_none());
    assert_eq!(fx.ledger.balance("user-1").await.unwrap(), 100);

    // Cancel again: terminal jobs reject cancellation.
    assert!(fx.jobs.cancel(job.id()).await.is_err());
}

#[tokio::test]
async fn test_non_pending_cancellation_rejected() {
    let fx = fixture(100).await;
    let job = fx.jobs.submit(request()).await.unwrap();

    let mut running = fx.store.load(job.id()).await.unwrap();
    running.transition_to(JobStatus::Extracting).unwrap();
    fx.store.save(&running).await.unwrap();

    let error = fx.jobs.cancel(job.id()).await.unwrap_err();
    assert!(error.to_string().contains("only pending jobs"));
}

#[tokio::test]
async fn test_credit_conservation_success_commits_once() {
    let fx = fixture(100).await;
    let job = fx.jobs.submit(request()).await.unwrap();
    let cost = JobService::estimate_cost(&JobConfig::default());

    let mut job = fx.store.load(job.id()).await.unwrap();
    fx.jobs
        .finalize_success(&mut job, JobResult::default())
        .await
        .unwrap();

    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(fx.ledger.balance("user-1").await.unwrap(), 100 - cost);

    // A redelivered finalization must not double-commit; the ledger rejects
    // a second finalization and the balance is unchanged.
    let receipt_id = *job.credit_receipt_id().unwrap();
    fx.ledger
        .commit(&receipt_id, &format!("{}:completed", job.id()))
        .await
        .unwrap();
    assert_eq!(fx.ledger.balance("user-1").await.unwrap(), 100 - cost);
}

#[tokio::test]
async fn test_credit_conservation_failure_refunds_once() {
    let fx = fixture(100).await;
    let job = fx.jobs.submit(request()).await.unwrap();

    let mut job = fx.store.load(job.id()).await.unwrap();
    fx.jobs
        .finalize_failure(&mut job, &PipelineError::processing_failed("no frames"))
        .await
        .unwrap();

    assert_eq!(job.status(), JobStatus::Failed);
    assert_eq!(job.error(), Some("Processing failed: no frames"));
    assert_eq!(fx.ledger.balance("user-1").await.unwrap(), 100);
}
