// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite Job Store
//!
//! `JobStore` implementation over `sqlx::SqlitePool`. Structured columns for
//! the queryable fields, JSON columns for the config/progress/result
//! payloads. Deleting a job cascades to its frame records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use commerce_pipeline_domain::{
    FrameMetadata, Job, JobConfig, JobId, JobProgress, JobResult, JobStatus, JobStore,
    PipelineError, ReceiptId,
};

pub(crate) fn db_err(err: sqlx::Error) -> PipelineError {
    PipelineError::database_error(err.to_string())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, PipelineError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PipelineError::database_error(format!("bad timestamp '{}': {}", raw, e)))
}

fn parse_optional_timestamp(raw: Option<String>) -> Result<Option<DateTime<Utc>>, PipelineError> {
    raw.as_deref().map(parse_timestamp).transpose()
}

/// SQLite-backed job persistence.
#[derive(Clone)]
pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> Result<Job, PipelineError> {
        let id = JobId::parse(&row.get::<String, _>("id"))?;
        let config: JobConfig = serde_json::from_str(&row.get::<String, _>("config"))?;
        let status = JobStatus::parse(&row.get::<String, _>("status"))?;
        let progress: JobProgress = serde_json::from_str(&row.get::<String, _>("progress"))?;
        let result: Option<JobResult> = row
            .get::<Option<String>, _>("result")
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        let credit_receipt_id = row
            .get::<Option<String>, _>("credit_receipt_id")
            .as_deref()
            .map(ReceiptId::parse)
            .transpose()?;

        Ok(Job::hydrate(
            id,
            row.get("user_id"),
            row.get("api_key_id"),
            row.get("video_url"),
            row.get("stack_id"),
            config,
            status,
            progress,
            result,
            row.get("error"),
            row.get("callback_url"),
            credit_receipt_id,
            parse_timestamp(&row.get::<String, _>("created_at"))?,
            parse_timestamp(&row.get::<String, _>("updated_at"))?,
            parse_optional_timestamp(row.get("started_at"))?,
            parse_optional_timestamp(row.get("completed_at"))?,
        ))
    }
}

#[async_trait]
impl JobStore for SqliteJobRepository {
    async fn create(&self, job: &Job) -> Result<(), PipelineError> {
        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, user_id, api_key_id, video_url, stack_id, config, status,
                progress, result, error, callback_url, credit_receipt_id,
                created_at, updated_at, started_at, completed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(job.id().to_string())
        .bind(job.user_id())
        .bind(job.api_key_id())
        .bind(job.video_url())
        .bind(job.stack_id())
        .bind(serde_json::to_string(job.config())?)
        .bind(job.status().as_str())
        .bind(serde_json::to_string(job.progress())?)
        .bind(job.result().map(serde_json::to_string).transpose()?)
        .bind(job.error())
        .bind(job.callback_url())
        .bind(job.credit_receipt_id().map(|r| r.to_string()))
        .bind(job.created_at().to_rfc3339())
        .bind(job.updated_at().to_rfc3339())
        .bind(job.started_at().map(|t| t.to_rfc3339()))
        .bind(job.completed_at().map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn load(&self, id: &JobId) -> Result<Job, PipelineError> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| PipelineError::JobNotFound(id.to_string()))?;
        Self::row_to_job(&row)
    }

    async fn save(&self, job: &Job) -> Result<(), PipelineError> {
        let affected = sqlx::query(
            r#"
            UPDATE jobs SET
                status = ?, progress = ?, result = ?, error = ?,
                credit_receipt_id = ?, callback_url = ?,
                updated_at = ?, started_at = ?, completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(job.status().as_str())
        .bind(serde_json::to_string(job.progress())?)
        .bind(job.result().map(serde_json::to_string).transpose()?)
        .bind(job.error())
        .bind(job.credit_receipt_id().map(|r| r.to_string()))
        .bind(job.callback_url())
        .bind(job.updated_at().to_rfc3339())
        .bind(job.started_at().map(|t| t.to_rfc3339()))
        .bind(job.completed_at().map(|t| t.to_rfc3339()))
        .bind(job.id().to_string())
        .execute(&self.pool)
        .await
        .map_err(db_err)?
        .rows_affected();

        if affected == 0 {
            return Err(PipelineError::JobNotFound(job.id().to_string()));
        }
        Ok(())
    }

    async fn delete(&self, id: &JobId) -> Result<(), PipelineError> {
        sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn insert_frame_records(
        &self,
        job_id: &JobId,
        frames: &[FrameMetadata],
    ) -> Result<Vec<i64>, PipelineError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let now = Utc::now().to_rfc3339();
        let mut ids = Vec::with_capacity(frames.len());
        for frame in frames {
            let result = sqlx::query(
                "INSERT INTO job_frames (job_id, frame_id, payload, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(job_id.to_string())
            .bind(frame.frame_id.to_string())
            .bind(serde_json::to_string(frame)?)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
            ids.push(result.last_insert_rowid());
        }
        tx.commit().await.map_err(db_err)?;
        Ok(ids)
    }
}
