// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite Job Queue
//!
//! At-least-once queue over a single table, claimed with the transactional
//! `UPDATE … WHERE status = 'queued'` idiom. A visibility timeout reclaims
//! messages whose worker died mid-claim, which is where the "at least once"
//! comes from; consumers must resume from the durable job record.
//!
//! Failure handling: `nack` schedules a retry with exponential backoff
//! (5 s, 10 s, 20 s, …) until the attempt budget is spent, then the message
//! is dead-lettered. Completed and dead messages are retained for their
//! observability windows and swept periodically.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use sqlx::{Row, SqlitePool};
use tracing::info;

use commerce_pipeline_domain::repositories::job_queue::{
    JobQueue, QueueDelivery, RetentionWindow, COMPLETED_RETENTION, DEAD_RETENTION,
    INITIAL_BACKOFF_SECS, MAX_ATTEMPTS,
};
use commerce_pipeline_domain::{JobId, PipelineError};

use crate::infrastructure::repositories::sqlite_job_repository::db_err;

/// Default reclaim window for claimed-but-abandoned messages.
pub const DEFAULT_VISIBILITY_TIMEOUT_SECS: i64 = 600;

/// SQLite-backed work queue.
#[derive(Clone)]
pub struct SqliteJobQueue {
    pool: SqlitePool,
    visibility_timeout_secs: i64,
}

impl SqliteJobQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            visibility_timeout_secs: DEFAULT_VISIBILITY_TIMEOUT_SECS,
        }
    }

    pub fn with_visibility_timeout(mut self, secs: i64) -> Self {
        self.visibility_timeout_secs = secs;
        self
    }

    fn backoff_secs(attempt: u32) -> i64 {
        (INITIAL_BACKOFF_SECS as i64) << attempt.saturating_sub(1).min(16)
    }

    async fn sweep_window(
        &self,
        status: &str,
        window: RetentionWindow,
    ) -> Result<(), PipelineError> {
        let cutoff = (Utc::now() - ChronoDuration::seconds(window.max_age_secs as i64)).to_rfc3339();
        sqlx::query("DELETE FROM job_queue WHERE status = ? AND finished_at < ?")
            .bind(status)
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        sqlx::query(
            r#"
            DELETE FROM job_queue WHERE status = ? AND id NOT IN (
                SELECT id FROM job_queue WHERE status = ? ORDER BY id DESC LIMIT ?
            )
            "#,
        )
        .bind(status)
        .bind(status)
        .bind(window.max_messages as i64)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn enqueue(&self, job_id: &JobId) -> Result<(), PipelineError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO job_queue (job_id, status, attempts, next_attempt_at, created_at)
            VALUES (?, 'queued', 0, ?, ?)
            ON CONFLICT(job_id) DO NOTHING
            "#,
        )
        .bind(job_id.to_string())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<QueueDelivery>, PipelineError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let reclaim_cutoff =
            (now - ChronoDuration::seconds(self.visibility_timeout_secs)).to_rfc3339();

        let candidate = sqlx::query(
            r#"
            SELECT id, job_id, attempts FROM job_queue
            WHERE (status = 'queued' AND next_attempt_at <= ?)
               OR (status = 'claimed' AND claimed_at <= ?)
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(&now_str)
        .bind(&reclaim_cutoff)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let Some(row) = candidate else {
            tx.commit().await.map_err(db_err)?;
            return Ok(None);
        };
        let message_id: i64 = row.get("id");
        let job_id = JobId::parse(&row.get::<String, _>("job_id"))?;
        let attempts: i64 = row.get("attempts");

        let claimed = sqlx::query(
            r#"
            UPDATE job_queue
            SET status = 'claimed', claimed_at = ?, attempts = attempts + 1
            WHERE id = ? AND (status = 'queued' OR (status = 'claimed' AND claimed_at <= ?))
            "#,
        )
        .bind(&now_str)
        .bind(message_id)
        .bind(&reclaim_cutoff)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .rows_affected();

        tx.commit().await.map_err(db_err)?;

        if claimed == 0 {
            // Lost the claim race to another worker.
            return Ok(None);
        }

        Ok(Some(QueueDelivery {
            message_id,
            job_id,
            attempt: attempts as u32 + 1,
        }))
    }

    async fn ack(&self, delivery: &QueueDelivery) -> Result<(), PipelineError> {
        sqlx::query(
            "UPDATE job_queue SET status = 'completed', finished_at = ? WHERE id = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(delivery.message_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn nack(&self, delivery: &QueueDelivery, error: &str) -> Result<bool, PipelineError> {
        let now = Utc::now();
        if delivery.attempt >= MAX_ATTEMPTS {
            sqlx::query(
                r#"
                UPDATE job_queue
                SET status = 'dead', finished_at = ?, last_error = ?
                WHERE id = ?
                "#,
            )
            .bind(now.to_rfc3339())
            .bind(error)
            .bind(delivery.message_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
            info!(job = %delivery.job_id, attempts = delivery.attempt, "message dead-lettered");
            return Ok(true);
        }

        let next_attempt =
            (now + ChronoDuration::seconds(Self::backoff_secs(delivery.attempt))).to_rfc3339();
        sqlx::query(
            r#"
            UPDATE job_queue
            SET status = 'queued', next_attempt_at = ?, last_error = ?, claimed_at = NULL
            WHERE id = ?
            "#,
        )
        .bind(&next_attempt)
        .bind(error)
        .bind(delivery.message_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(false)
    }

    async fn remove_pending(&self, job_id: &JobId) -> Result<bool, PipelineError> {
        let removed = sqlx::query("DELETE FROM job_queue WHERE job_id = ? AND status = 'queued'")
            .bind(job_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?
            .rows_affected();
        Ok(removed > 0)
    }

    async fn sweep_retention(&self) -> Result<(), PipelineError> {
        self.sweep_window("completed", COMPLETED_RETENTION).await?;
        self.sweep_window("dead", DEAD_RETENTION).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::schema::ensure_schema;

    async fn queue() -> SqliteJobQueue {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap();
        ensure_schema(&pool).await.unwrap();
        SqliteJobQueue::new(pool)
    }

    #[tokio::test]
    async fn test_dequeue_empty_queue() {
        let queue = queue().await;
        assert!(queue.dequeue().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_enqueue_dedups_by_job_id() {
        let queue = queue().await;
        let job_id = JobId::new();
        queue.enqueue(&job_id).await.unwrap();
        queue.enqueue(&job_id).await.unwrap();

        let first = queue.dequeue().await.unwrap();
        assert!(first.is_some());
        assert!(queue.dequeue().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_is_exclusive_until_acked() {
        let queue = queue().await;
        let job_id = JobId::new();
        queue.enqueue(&job_id).await.unwrap();

        let delivery = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(delivery.job_id, job_id);
        assert_eq!(delivery.attempt, 1);

        // Claimed message is invisible.
        assert!(queue.dequeue().await.unwrap().is_none());

        queue.ack(&delivery).await.unwrap();
        assert!(queue.dequeue().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_nack_schedules_backoff() {
        let queue = queue().await;
        let job_id = JobId::new();
        queue.enqueue(&job_id).await.unwrap();

        let delivery = queue.dequeue().await.unwrap().unwrap();
        let dead = queue.nack(&delivery, "provider timeout").await.unwrap();
        assert!(!dead);

        // Backoff has not elapsed, so the message is not yet due.
        assert!(queue.dequeue().await.unwrap().is_none());

        let next_attempt_at: String =
            sqlx::query_scalar("SELECT next_attempt_at FROM job_queue WHERE job_id = ?")
                .bind(job_id.to_string())
                .fetch_one(&queue.pool)
                .await
                .unwrap();
        let due = chrono::DateTime::parse_from_rfc3339(&next_attempt_at).unwrap();
        let delta = due.with_timezone(&Utc) - Utc::now();
        assert!(delta.num_seconds() >= 3 && delta.num_seconds() <= 6);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_dead_letter() {
        let queue = queue().await;
        let job_id = JobId::new();
        queue.enqueue(&job_id).await.unwrap();

        let delivery = queue.dequeue().await.unwrap().unwrap();
        let exhausted = QueueDelivery {
            attempt: MAX_ATTEMPTS,
            ..delivery
        };
        let dead = queue.nack(&exhausted, "still failing").await.unwrap();
        assert!(dead);
        assert!(queue.dequeue().await.unwrap().is_none());

        let status: String =
            sqlx::query_scalar("SELECT status FROM job_queue WHERE job_id = ?")
                .bind(job_id.to_string())
                .fetch_one(&queue.pool)
                .await
                .unwrap();
        assert_eq!(status, "dead");
    }

    #[tokio::test]
    async fn test_stale_claim_is_redelivered() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap();
        ensure_schema(&pool).await.unwrap();
        let queue = SqliteJobQueue::new(pool).with_visibility_timeout(0);

        let job_id = JobId::new();
        queue.enqueue(&job_id).await.unwrap();

        let first = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(first.attempt, 1);

        // Visibility timeout of zero: the claim is immediately stale, as if
        // the worker crashed.
        let second = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(second.job_id, job_id);
        assert_eq!(second.attempt, 2);
    }

    #[tokio::test]
    async fn test_remove_pending_only_removes_unclaimed() {
        let queue = queue().await;
        let job_id = JobId::new();
        queue.enqueue(&job_id).await.unwrap();
        assert!(queue.remove_pending(&job_id).await.unwrap());

        queue.enqueue(&job_id).await.unwrap();
        let _delivery = queue.dequeue().await.unwrap().unwrap();
        assert!(!queue.remove_pending(&job_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_backoff_doubles_per_attempt() {
        assert_eq!(SqliteJobQueue::backoff_secs(1), 5);
        assert_eq!(SqliteJobQueue::backoff_secs(2), 10);
        assert_eq!(SqliteJobQueue::backoff_secs(3), 20);
    }
}
