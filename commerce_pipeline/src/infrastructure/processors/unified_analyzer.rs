// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Unified Video Analyzer Processor
//!
//! Single-call whole-video analysis: one provider pass yields the
//! transcript, the product metadata, and the timestamps of the frames worth
//! keeping; the selected frames are then materialized in parallel through
//! the extraction provider, with ordered results.
//!
//! Timestamps outside `[0, duration]` are discarded (the analyzer is a
//! model; trust but verify) and the selection is capped at `max_frames`.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use commerce_pipeline_domain::services::providers::{
    UnifiedAnalysisSpec, UnifiedAnalyzerProvider, VideoExtractionProvider,
};
use commerce_pipeline_domain::{
    DataPatch, DataPath, FrameMetadata, PipelineData, PipelineError, PipelineMetadata, Processor,
    ProcessorContext, ProcessorIo, StepOptions, StepOutput, VideoData,
};

use crate::infrastructure::processors::{concurrency, explicit_provider};
use crate::infrastructure::runtime::parallel::parallel_map;

const DEFAULT_CONCURRENCY: usize = 4;
const DEFAULT_MAX_FRAMES: usize = 20;

pub struct UnifiedVideoAnalyzerProcessor;

#[async_trait]
impl Processor for UnifiedVideoAnalyzerProcessor {
    fn id(&self) -> &str {
        "gemini-unified-video-analyzer"
    }

    fn display_name(&self) -> &str {
        "Unified video analysis"
    }

    fn status_key(&self) -> &str {
        "classifying"
    }

    fn io(&self) -> ProcessorIo {
        ProcessorIo::new(
            [DataPath::Video],
            [
                DataPath::Frames,
                DataPath::Images,
                DataPath::Transcript,
                DataPath::ProductMetadata,
            ],
        )
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
                PipelineError::precondition("unified analysis needs a localized video path")
            })?;

        let analyzer = context
            .providers()
            .unified_analyzer(explicit_provider(options), Some(&context.ab_seed()))?;
        let extraction = context
            .providers()
            .video_extraction(None, Some(&context.ab_seed()))?;

        let max_frames = options
            .get_u64("max_frames")
            .map(|m| m.max(1) as usize)
            .unwrap_or(DEFAULT_MAX_FRAMES);
        let model = options
            .get_str("model")
            .unwrap_or(&context.config().gemini_model)
            .to_string();

        let probe = extraction.provider.probe(&video).await?;
        context.check_cancelled("unified analysis")?;

        let started = std::time::Instant::now();
        let analysis = analyzer
            .provider
            .analyze_video(
                &video,
                &UnifiedAnalysisSpec {
                    max_frames,
                    model,
                },
            )
            .await?;
        context
            .timer()
            .record_operation("analyze_video", started.elapsed());

        let mut timestamps: Vec<f64> = analysis
            .selected_timestamps
            .iter()
            .copied()
            .filter(|ts| (0.0..=probe.duration_secs).contains(ts))
            .collect();
        if timestamps.len() < analysis.selected_timestamps.len() {
            warn!(
                discarded = analysis.selected_timestamps.len() - timestamps.len(),
                "analyzer returned out-of-range timestamps"
            );
        }
        timestamps.truncate(max_frames);
        if timestamps.is_empty() {
            return Err(PipelineError::processing_failed(
                "unified analysis selected no usable frames",
            ));
        }

        let candidates_dir = context.work_dirs().candidates();
        let provider_for_items = Arc::clone(&extraction.provider);
        let video_for_items = video.clone();
        let outcome = parallel_map(
            timestamps,
            concurrency(options, DEFAULT_CONCURRENCY),
            context.cancellation(),
            move |index, timestamp| {
                let provider = Arc::clone(&provider_for_items);
                let video = video_for_items.clone();
                let out_path = candidates_dir.join(format!("candidate_{index:04}.jpg"));
                async move {
                    let path = provider.extract_frame(&video, timestamp, &out_path).await?;
                    Ok((index, timestamp, path))
                }
            },
        )
        .await;

        if outcome.success_count == 0 {
            return Err(PipelineError::processing_failed(
                "could not materialize any analyzer-selected frame",
            ));
        }

        let frames: Vec<FrameMetadata> = outcome
            .into_successes()
            .into_iter()
            .map(|(index, timestamp, path)| {
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| format!("candidate_{index:04}.jpg"));
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
            metadata: Some(PipelineMetadata {
                frames,
                transcript: analysis.transcript.or_else(|| data.metadata.transcript.clone()),
                product_metadata: Some(analysis.product),
                extensions: data.metadata.extensions.clone(),
            }),
            ..Default::default()
        }))
    }
}
