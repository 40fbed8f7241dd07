// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Transcription Processor
//!
//! Turns the extracted audio track into a transcript. Templates put this
//! step behind a `HasPath(audio)` condition; an empty provider transcript is
//! tolerated as a no-op rather than an error, since silence is not a defect
//! of the job.

use async_trait::async_trait;
use tracing::debug;

use commerce_pipeline_domain::services::providers::TranscriptionProvider;
use commerce_pipeline_domain::{
    DataPatch, DataPath, PipelineData, PipelineError, PipelineMetadata, Processor,
    ProcessorContext, ProcessorIo, StepOptions, StepOutput,
};

use crate::infrastructure::processors::explicit_provider;

pub struct TranscribeProcessor;

#[async_trait]
impl Processor for TranscribeProcessor {
    fn id(&self) -> &str {
        "transcribe"
    }

    fn display_name(&self) -> &str {
        "Transcribe audio"
    }

    fn status_key(&self) -> &str {
        "classifying"
    }

    fn io(&self) -> ProcessorIo {
        ProcessorIo::new([DataPath::Audio], [DataPath::Transcript])
    }

    async fn execute(
        &self,
        context: &ProcessorContext,
        data: &PipelineData,
        options: &StepOptions,
    ) -> Result<StepOutput, PipelineError> {
        let audio = data
            .audio
            .as_ref()
            .filter(|a| a.has_audio)
            .and_then(|a| a.path.clone())
            .ok_or_else(|| {
                PipelineError::precondition("transcription needs an extracted audio track")
            })?;

        let selection = context
            .providers()
            .transcription(explicit_provider(options), Some(&context.ab_seed()))?;

        context.check_cancelled("transcription")?;
        let started = std::time::Instant::now();
        let transcript = selection.provider.transcribe(&audio).await?;
        context
            .timer()
            .record_operation("transcribe", started.elapsed());

        if transcript.is_empty() {
            debug!("transcription returned no speech");
            return Ok(StepOutput::noop());
        }

        Ok(StepOutput::advance(DataPatch {
            metadata: Some(PipelineMetadata {
                transcript: Some(transcript),
                ..data.metadata.clone()
            }),
            ..Default::default()
        }))
    }
}
