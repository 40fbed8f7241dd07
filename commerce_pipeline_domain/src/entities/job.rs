// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Job Entity
//!
//! The durable record for one video-to-commerce processing job. A job is
//! created `Pending` at admission (after credits are reserved), advances
//! monotonically through the processing statuses as the executor reports
//! progress, and ends in exactly one terminal state. No terminal state may be
//! left, and status never moves backwards; that is what makes queue
//! redelivery safe: a consumer that loads a terminal job acks and walks away.
//!
//! ## Lifecycle
//!
//! ```text
//! Pending → Downloading → Extracting → Scoring → Classifying
//!         → Generating → Uploading → {Completed | Failed | Cancelled}
//! ```
//!
//! Jobs may skip stages (a classification-only stack jumps straight to
//! `Classifying`); they may never revert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::value_objects::{CommercialVersion, JobId, ReceiptId};
use crate::PipelineError;

/// Per-job processing configuration, validated at admission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Frame sampling rate, frames per second. Valid range `[1, 30]`.
    pub fps: u32,
    /// Classification batch size. Valid range `[1, 100]`.
    pub batch_size: u32,
    /// Which commercial background treatments to synthesize.
    pub commercial_versions: BTreeSet<CommercialVersion>,
    /// Whether to run the AI cleanup (upscale) pass on final frames.
    pub ai_cleanup: bool,
    /// Model identifier passed to the AI providers.
    pub gemini_model: String,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            fps: 4,
            batch_size: 10,
            commercial_versions: BTreeSet::from([
                CommercialVersion::Transparent,
                CommercialVersion::Solid,
            ]),
            ai_cleanup: false,
            gemini_model: "gemini-2.0-flash".to_string(),
        }
    }
}

impl JobConfig {
    /// Validates the configuration ranges.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(1..=30).contains(&self.fps) {
            return Err(PipelineError::validation(format!(
                "fps must be in [1, 30], got {}",
                self.fps
            )));
        }
        if !(1..=100).contains(&self.batch_size) {
            return Err(PipelineError::validation(format!(
                "batch_size must be in [1, 100], got {}",
                self.batch_size
            )));
        }
        if self.gemini_model.is_empty() {
            return Err(PipelineError::validation("gemini_model cannot be empty"));
        }
        Ok(())
    }
}

/// Lifecycle state of a job. Ordered: transitions only move to states with a
/// strictly greater rank (same-state updates are tolerated as no-ops).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Downloading,
    Extracting,
    Scoring,
    Classifying,
    Generating,
    Uploading,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Canonical lowercase name, used in the database and callback payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Downloading => "downloading",
            JobStatus::Extracting => "extracting",
            JobStatus::Scoring => "scoring",
            JobStatus::Classifying => "classifying",
            JobStatus::Generating => "generating",
            JobStatus::Uploading => "uploading",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Parses a status from its canonical name.
    pub fn parse(s: &str) -> Result<Self, PipelineError> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "downloading" => Ok(JobStatus::Downloading),
            "extracting" => Ok(JobStatus::Extracting),
            "scoring" => Ok(JobStatus::Scoring),
            "classifying" => Ok(JobStatus::Classifying),
            "generating" => Ok(JobStatus::Generating),
            "uploading" => Ok(JobStatus::Uploading),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(PipelineError::validation(format!(
                "unknown job status '{}'",
                other
            ))),
        }
    }

    /// Whether the status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    fn rank(&self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Downloading => 1,
            JobStatus::Extracting => 2,
            JobStatus::Scoring => 3,
            JobStatus::Classifying => 4,
            JobStatus::Generating => 5,
            JobStatus::Uploading => 6,
            // Terminal states share the top rank; reaching one of them
            // forecloses the others via `is_terminal`.
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => 7,
        }
    }

    /// Whether a transition to `next` respects monotonicity.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }
}

/// Progress snapshot written by the executor's progress callbacks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    pub step: String,
    pub percentage: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames_extracted: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames_scored: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variants_discovered: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images_generated: Option<u32>,
    pub total_steps: u32,
    pub current_step: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Terminal result summary for a completed job. Serialized with the wire
/// casing the callback consumers expect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub variants_discovered: u32,
    pub frames_analyzed: u32,
    pub final_frames: Vec<String>,
    /// `frame id → (version → url)` for every synthesized commercial image.
    pub commercial_images: BTreeMap<String, BTreeMap<CommercialVersion, String>>,
}

impl JobResult {
    /// Summarizes the terminal pipeline data into the durable result shape.
    pub fn summarize(data: &crate::entities::pipeline_data::PipelineData) -> Self {
        let frames = &data.metadata.frames;
        let variants: std::collections::BTreeSet<&str> = frames
            .iter()
            .filter_map(|f| f.variant_id.as_deref())
            .collect();
        let final_frames: Vec<String> = frames
            .iter()
            .filter(|f| f.is_final_selection == Some(true) && f.version.is_none())
            .map(|f| f.frame_id.to_string())
            .collect();

        let mut commercial_images: BTreeMap<String, BTreeMap<CommercialVersion, String>> =
            BTreeMap::new();
        for frame in frames {
            let Some(version) = frame.version else {
                continue;
            };
            let url = frame
                .s3_url
                .clone()
                .unwrap_or_else(|| frame.path.to_string_lossy().into_owned());
            commercial_images
                .entry(frame.origin_frame_id().to_string())
                .or_default()
                .insert(version, url);
        }

        Self {
            variants_discovered: variants.len() as u32,
            frames_analyzed: frames.iter().filter(|f| f.version.is_none()).count() as u32,
            final_frames,
            commercial_images,
        }
    }
}

/// The durable job record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    // Identity fields (always first)
    id: JobId,
    user_id: String,

    // Core business fields
    api_key_id: Option<String>,
    callback_url: Option<String>,
    config: JobConfig,
    credit_receipt_id: Option<ReceiptId>,
    error: Option<String>,
    progress: JobProgress,
    result: Option<JobResult>,
    stack_id: String,
    status: JobStatus,
    video_url: String,

    // Metadata fields (always last)
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Creates a new pending job.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Validation` when the input reference is empty
    /// or the configuration is out of range.
    pub fn new(
        user_id: impl Into<String>,
        video_url: impl Into<String>,
        stack_id: impl Into<String>,
        config: JobConfig,
    ) -> Result<Self, PipelineError> {
        let user_id = user_id.into();
        let video_url = video_url.into();
        let stack_id = stack_id.into();
        if user_id.is_empty() {
            return Err(PipelineError::validation("user id cannot be empty"));
        }
        if video_url.is_empty() {
            return Err(PipelineError::validation(
                "video reference cannot be empty",
            ));
        }
        if stack_id.is_empty() {
            return Err(PipelineError::validation("stack id cannot be empty"));
        }
        config.validate()?;

        let now = Utc::now();
        Ok(Self {
            id: JobId::new(),
            user_id,
            api_key_id: None,
            callback_url: None,
            config,
            credit_receipt_id: None,
            error: None,
            progress: JobProgress::default(),
            result: None,
            stack_id,
            status: JobStatus::Pending,
            video_url,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        })
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn api_key_id(&self) -> Option<&str> {
        self.api_key_id.as_deref()
    }

    pub fn callback_url(&self) -> Option<&str> {
        self.callback_url.as_deref()
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    pub fn credit_receipt_id(&self) -> Option<&ReceiptId> {
        self.credit_receipt_id.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn progress(&self) -> &JobProgress {
        &self.progress
    }

    pub fn result(&self) -> Option<&JobResult> {
        self.result.as_ref()
    }

    pub fn stack_id(&self) -> &str {
        &self.stack_id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn video_url(&self) -> &str {
        &self.video_url
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn set_api_key_id(&mut self, api_key_id: impl Into<String>) {
        self.api_key_id = Some(api_key_id.into());
        self.touch();
    }

    pub fn set_callback_url(&mut self, url: impl Into<String>) {
        self.callback_url = Some(url.into());
        self.touch();
    }

    /// Attaches the credit reservation receipt obtained at admission.
    pub fn attach_receipt(&mut self, receipt_id: ReceiptId) {
        self.credit_receipt_id = Some(receipt_id);
        self.touch();
    }

    /// Advances the lifecycle state.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Validation` on a reverting transition or on
    /// any transition out of a terminal state.
    pub fn transition_to(&mut self, next: JobStatus) -> Result<(), PipelineError> {
        if self.status == next {
            return Ok(());
        }
        if !self.status.can_transition_to(next) {
            return Err(PipelineError::validation(format!(
                "illegal job transition {} -> {}",
                self.status.as_str(),
                next.as_str()
            )));
        }
        if self.status == JobStatus::Pending && self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        self.touch();
        Ok(())
    }

    /// Records a progress snapshot. Percentage is clamped to be
    /// non-decreasing so callback consumers never observe regressions.
    pub fn record_progress(&mut self, mut progress: JobProgress) {
        if progress.percentage < self.progress.percentage {
            progress.percentage = self.progress.percentage;
        }
        self.progress = progress;
        self.touch();
    }

    /// Marks the job completed with its result summary.
    pub fn complete(&mut self, result: JobResult) -> Result<(), PipelineError> {
        self.transition_to(JobStatus::Completed)?;
        self.result = Some(result);
        self.progress.percentage = 100.0;
        Ok(())
    }

    /// Marks the job failed with a user-visible error sentence.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), PipelineError> {
        self.transition_to(JobStatus::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }

    /// Marks the job cancelled.
    pub fn cancel(&mut self) -> Result<(), PipelineError> {
        self.transition_to(JobStatus::Cancelled)?;
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Rehydrates a job from persistence. Not validated: the store is the
    /// source of truth for its own rows.
    #[allow(clippy::too_many_arguments)]
    pub fn hydrate(
        id: JobId,
        user_id: String,
        api_key_id: Option<String>,
        video_url: String,
        stack_id: String,
        config: JobConfig,
        status: JobStatus,
        progress: JobProgress,
        result: Option<JobResult>,
        error: Option<String>,
        callback_url: Option<String>,
        credit_receipt_id: Option<ReceiptId>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        started_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            user_id,
            api_key_id,
            callback_url,
            config,
            credit_receipt_id,
            error,
            progress,
            result,
            stack_id,
            status,
            video_url,
            created_at,
            updated_at,
            started_at,
            completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new("user-1", "https://host/x.mp4", "quick_test", JobConfig::default()).unwrap()
    }

    #[test]
    fn test_config_ranges() {
        let mut config = JobConfig::default();
        config.fps = 0;
        assert!(config.validate().is_err());
        config.fps = 30;
        assert!(config.validate().is_ok());
        config.batch_size = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_monotonic_transitions() {
        let mut job = job();
        job.transition_to(JobStatus::Downloading).unwrap();
        job.transition_to(JobStatus::Scoring).unwrap();

        // Reverting is rejected.
        assert!(job.transition_to(JobStatus::Downloading).is_err());

        job.transition_to(JobStatus::Completed).unwrap();
        assert!(job.status().is_terminal());
        assert!(job.completed_at().is_some());

        // Terminal states may not be left.
        assert!(job.transition_to(JobStatus::Failed).is_err());
    }

    #[test]
    fn test_skipping_stages_is_allowed() {
        let mut job = job();
        job.transition_to(JobStatus::Classifying).unwrap();
        assert_eq!(job.status(), JobStatus::Classifying);
    }

    #[test]
    fn test_started_at_set_on_first_leave_of_pending() {
        let mut job = job();
        assert!(job.started_at().is_none());
        job.transition_to(JobStatus::Downloading).unwrap();
        assert!(job.started_at().is_some());
    }

    #[test]
    fn test_progress_percentage_never_decreases() {
        let mut job = job();
        job.record_progress(JobProgress {
            percentage: 40.0,
            ..Default::default()
        });
        job.record_progress(JobProgress {
            percentage: 25.0,
            ..Default::default()
        });
        assert_eq!(job.progress().percentage, 40.0);
    }

    #[test]
    fn test_fail_records_error() {
        let mut job = job();
        job.fail("frame extraction produced no frames").unwrap();
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(
            job.error(),
            Some("frame extraction produced no frames")
        );
    }

    #[test]
    fn test_validation_rejects_empty_input() {
        assert!(Job::new("", "https://x/y.mp4", "quick_test", JobConfig::default()).is_err());
        assert!(Job::new("u", "", "quick_test", JobConfig::default()).is_err());
        assert!(Job::new("u", "https://x/y.mp4", "", JobConfig::default()).is_err());
    }
}
