// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Job Store Port
//!
//! Durable persistence for job records and their frame rows. Queue
//! redelivery recovers state from here, never from in-process memory, so
//! every mutation the lifecycle layer makes must land in the store before
//! the corresponding queue operation.

use async_trait::async_trait;

use crate::entities::frame_metadata::FrameMetadata;
use crate::entities::job::Job;
use crate::value_objects::JobId;
use crate::PipelineError;

/// Durable storage for jobs and frame records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persists a new job row.
    async fn create(&self, job: &Job) -> Result<(), PipelineError>;

    /// Loads a job by id.
    async fn load(&self, id: &JobId) -> Result<Job, PipelineError>;

    /// Persists the current state of an existing job (status, progress,
    /// result, error, timestamps).
    async fn save(&self, job: &Job) -> Result<(), PipelineError>;

    /// Deletes a job row; cascades to its frame records.
    async fn delete(&self, id: &JobId) -> Result<(), PipelineError>;

    /// Inserts frame records for a job, returning the database ids in input
    /// order.
    async fn insert_frame_records(
        &self,
        job_id: &JobId,
        frames: &[FrameMetadata],
    ) -> Result<Vec<i64>, PipelineError>;
}
