// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Audio Extraction Processor
//!
//! Pulls the audio track out of the localized video. Silent videos are not
//! an error: the step succeeds with `has_audio = false`, and downstream
//! audio consumers (transcription) are expected to sit behind a `HasPath`
//! condition on `audio`.

use async_trait::async_trait;

use commerce_pipeline_domain::services::providers::VideoExtractionProvider;
use commerce_pipeline_domain::{
    AudioData, DataPatch, DataPath, PipelineData, PipelineError, Processor, ProcessorContext,
    ProcessorIo, StepOptions, StepOutput,
};

use crate::infrastructure::processors::explicit_provider;

pub struct ExtractAudioProcessor;

#[async_trait]
impl Processor for ExtractAudioProcessor {
    fn id(&self) -> &str {
        "extract-audio"
    }

    fn display_name(&self) -> &str {
        "Extract audio"
    }

    fn status_key(&self) -> &str {
        "extracting"
    }

    fn io(&self) -> ProcessorIo {
        ProcessorIo::new([DataPath::Video], [DataPath::Audio])
    }

    async fn execute(
        &self,
        context: &ProcessorContext,
        data: &PipelineData,
        options: &StepOptions,
    ) -> Result<StepOutput, PipelineError> {
        let video = data
            .video
            .as_ref()
            .and_then(|v| v.path.clone())
            .ok_or_else(|| {
                PipelineError::precondition("audio extraction needs a localized video path")
            })?;

        let selection = context
            .providers()
            .video_extraction(explicit_provider(options), Some(&context.ab_seed()))?;

        context.check_cancelled("audio extraction")?;
        let out_path = context.work_dirs().video().join("audio.wav");
        let started = std::time::Instant::now();
        let extracted = selection.provider.extract_audio(&video, &out_path).await?;
        context
            .timer()
            .record_operation("extract_audio", started.elapsed());

        let audio = match extracted {
            Some(path) => AudioData {
                path: Some(path),
                has_audio: true,
            },
            None => AudioData {
                path: None,
                has_audio: false,
            },
        };

        Ok(StepOutput::advance(DataPatch {
            audio: Some(audio),
            ..Default::default()
        }))
    }
}
