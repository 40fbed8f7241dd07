// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Frame Extraction Processor
//!
//! Samples the localized video at the configured rate, fanning individual
//! frame grabs out through the parallel map. Per-frame failures are absorbed
//! (the survivor set drives the pipeline); zero surviving frames fails the
//! step. Produces the base frame records and the `images` mirror.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use commerce_pipeline_domain::services::providers::VideoExtractionProvider;
use commerce_pipeline_domain::{
    DataPatch, DataPath, FrameMetadata, PipelineData, PipelineError, Processor, ProcessorContext,
    ProcessorIo, StepOptions, StepOutput, VideoData,
};

use crate::infrastructure::processors::{concurrency, explicit_provider, metadata_with_frames};
use crate::infrastructure::runtime::parallel::parallel_map;

const DEFAULT_CONCURRENCY: usize = 4;
const DEFAULT_MAX_FRAMES: usize = 300;

pub struct ExtractFramesProcessor;

#[async_trait]
impl Processor for ExtractFramesProcessor {
    fn id(&self) -> &str {
        "extract-frames"
    }

    fn display_name(&self) -> &str {
        "Extract frames"
    }

    fn status_key(&self) -> &str {
        "extracting"
    }

    fn io(&self) -> ProcessorIo {
        ProcessorIo::new([DataPath::Video], [DataPath::Frames, DataPath::Images])
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
                PipelineError::precondition("frame extraction needs a localized video path")
            })?;

        let selection = context
            .providers()
            .video_extraction(explicit_provider(options), Some(&context.ab_seed()))?;
        let provider = selection.provider;

        let probe = provider.probe(&video).await?;
        context.check_cancelled("frame extraction")?;

        let fps = options
            .get_u64("fps")
            .map(|f| f as u32)
            .unwrap_or(context.config().fps)
            .max(1);
        let max_frames = options
            .get_u64("max_frames")
            .map(|m| m as usize)
            .unwrap_or(DEFAULT_MAX_FRAMES);

        let step = 1.0 / f64::from(fps);
        let timestamps: Vec<f64> = (0..)
            .map(|i| i as f64 * step)
            .take_while(|ts| *ts <= probe.duration_secs)
            .take(max_frames)
            .collect();

        let frames_dir = context.work_dirs().frames();
        let provider_for_items = Arc::clone(&provider);
        let video_for_items = video.clone();
        let outcome = parallel_map(
            timestamps,
            concurrency(options, DEFAULT_CONCURRENCY),
            context.cancellation(),
            move |index, timestamp| {
                let provider = Arc::clone(&provider_for_items);
                let video = video_for_items.clone();
                let out_path = frames_dir.join(format!("frame_{index:04}.jpg"));
                async move {
                    let path = provider.extract_frame(&video, timestamp, &out_path).await?;
                    Ok((index, timestamp, path))
                }
            },
        )
        .await;

        if outcome.error_count > 0 {
            warn!(
                failed = outcome.error_count,
                extracted = outcome.success_count,
                "some frame grabs failed"
            );
        }
        if outcome.success_count == 0 {
            return Err(PipelineError::processing_failed(
                "frame extraction produced no frames",
            ));
        }

        let frames: Vec<FrameMetadata> = outcome
            .into_successes()
            .into_iter()
            .map(|(index, timestamp, path)| {
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| format!("frame_{index:04}.jpg"));
                FrameMetadata::new(filename, path, timestamp, index)
            })
            .collect();
        let images = frames.iter().map(|f| f.path.clone()).collect();

        Ok(StepOutput::advance(DataPatch {
            images: Some(images),
            video: Some(VideoData {
                duration_secs: Some(probe.duration_secs),
                fps: Some(probe.fps),
                ..data.video.clone().unwrap_or_default()
            }),
            metadata: Some(metadata_with_frames(data, frames)),
            ..Default::default()
        }))
    }
}
