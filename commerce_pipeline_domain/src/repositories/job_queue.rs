// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Job Queue Port
//!
//! At-least-once work queue. The message is exactly the job id; everything
//! else is recovered from the job store on consume. Consumers must tolerate
//! redelivery: either detect a terminal job and ack immediately, or resume
//! from durable state and rely on processor idempotence.
//!
//! Retry policy: up to [`MAX_ATTEMPTS`] attempts with exponential backoff
//! starting at [`INITIAL_BACKOFF_SECS`]. After the final failure the message
//! is dead-lettered and the job row marked failed. Deduplication is by job
//! id. Completed messages are retained briefly for observability, failed
//! ones longer.

use async_trait::async_trait;

use crate::value_objects::JobId;
use crate::PipelineError;

/// Maximum delivery attempts before dead-lettering.
pub const MAX_ATTEMPTS: u32 = 3;

/// Backoff before the second attempt, in seconds; doubles per attempt.
pub const INITIAL_BACKOFF_SECS: u64 = 5;

/// Retention window for completed messages.
pub const COMPLETED_RETENTION: RetentionWindow = RetentionWindow {
    max_messages: 100,
    max_age_secs: 24 * 60 * 60,
};

/// Retention window for dead-lettered messages.
pub const DEAD_RETENTION: RetentionWindow = RetentionWindow {
    max_messages: 1000,
    max_age_secs: 7 * 24 * 60 * 60,
};

/// Bound on retained messages: whichever of count/age trips first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionWindow {
    pub max_messages: u64,
    pub max_age_secs: u64,
}

/// One claimed delivery of a queue message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueDelivery {
    /// Queue-internal message identity.
    pub message_id: i64,
    pub job_id: JobId,
    /// 1-based attempt counter.
    pub attempt: u32,
}

/// Work-queue port.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueues a job reference. Duplicate enqueues of the same job id are
    /// ignored (dedup key is the job id).
    async fn enqueue(&self, job_id: &JobId) -> Result<(), PipelineError>;

    /// Claims the next due message, if any.
    async fn dequeue(&self) -> Result<Option<QueueDelivery>, PipelineError>;

    /// Acknowledges successful processing; the message is retained for the
    /// completed-message observability window.
    async fn ack(&self, delivery: &QueueDelivery) -> Result<(), PipelineError>;

    /// Reports a failed attempt. The queue either schedules a retry with
    /// exponential backoff or dead-letters the message once attempts are
    /// exhausted; returns `true` when the message was dead-lettered.
    async fn nack(&self, delivery: &QueueDelivery, error: &str) -> Result<bool, PipelineError>;

    /// Removes a queued (unclaimed) message, for synchronous cancellation of
    /// pending jobs. Returns `true` when a message was removed.
    async fn remove_pending(&self, job_id: &JobId) -> Result<bool, PipelineError>;

    /// Applies the retention windows; called periodically by the worker.
    async fn sweep_retention(&self) -> Result<(), PipelineError>;
}
