// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Upscale Processor
//!
//! AI cleanup pass over the target frames. Templates gate this step behind
//! the `ai_cleanup` config flag; the processor itself just runs the upscale
//! provider and rewrites paths.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use commerce_pipeline_domain::services::providers::UpscaleProvider;
use commerce_pipeline_domain::{
    DataPatch, DataPath, PipelineData, PipelineError, Processor, ProcessorContext, ProcessorIo,
    StepOptions, StepOutput,
};

use crate::infrastructure::processors::{
    concurrency, explicit_provider, metadata_with_frames, split_filename, target_frame_indices,
};
use crate::infrastructure::runtime::parallel::parallel_map;

const DEFAULT_CONCURRENCY: usize = 2;

pub struct UpscaleProcessor;

#[async_trait]
impl Processor for UpscaleProcessor {
    fn id(&self) -> &str {
        "upscale"
    }

    fn display_name(&self) -> &str {
        "Upscale frames"
    }

    fn status_key(&self) -> &str {
        "generating"
    }

    fn io(&self) -> ProcessorIo {
        ProcessorIo::new([DataPath::Frames], [DataPath::Frames, DataPath::Images])
    }

    async fn execute(
        &self,
        context: &ProcessorContext,
        data: &PipelineData,
        options: &StepOptions,
    ) -> Result<StepOutput, PipelineError> {
        let selection = context
            .providers()
            .upscale(explicit_provider(options), Some(&context.ab_seed()))?;
        let provider = selection.provider;

        let final_dir = context.work_dirs().final_dir();
        let items: Vec<(usize, std::path::PathBuf, String)> = target_frame_indices(data)
            .into_iter()
            .map(|index| {
                let frame = &data.metadata.frames[index];
                (index, frame.path.clone(), frame.filename.clone())
            })
            .collect();

        let provider_for_items = Arc::clone(&provider);
        let outcome = parallel_map(
            items,
            concurrency(options, DEFAULT_CONCURRENCY),
            context.cancellation(),
            move |_, (index, path, filename)| {
                let provider = Arc::clone(&provider_for_items);
                let (stem, extension) = split_filename(&filename);
                let out_path = final_dir.join(format!("{stem}_upscaled{extension}"));
                async move {
                    let rewritten = provider.upscale(&path, &out_path).await?;
                    Ok((index, rewritten))
                }
            },
        )
        .await;

        if outcome.success_count == 0 {
            return Err(PipelineError::processing_failed(
                "upscaling failed for every frame",
            ));
        }
        if outcome.error_count > 0 {
            warn!(failed = outcome.error_count, "upscaling failed for some frames");
        }

        let mut frames = data.metadata.frames.clone();
        for (index, rewritten) in outcome.into_successes() {
            let replaced = frames[index].rewrite_path(rewritten);
            context.work_dirs().discard_replaced_file(&replaced);
        }

        let images = frames.iter().map(|f| f.path.clone()).collect();
        Ok(StepOutput::advance(DataPatch {
            images: Some(images),
            metadata: Some(metadata_with_frames(data, frames)),
            ..Default::default()
        }))
    }
}
