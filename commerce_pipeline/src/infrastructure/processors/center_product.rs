// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Product Centering Processor
//!
//! Re-centers the product in each target frame through the image-transform
//! provider, rewriting frame paths and the `images` mirror. This is the
//! canonical "later producer wins" case for the `images` path.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use commerce_pipeline_domain::services::providers::ImageTransformProvider;
use commerce_pipeline_domain::{
    DataPatch, DataPath, PipelineData, PipelineError, Processor, ProcessorContext, ProcessorIo,
    StepOptions, StepOutput,
};

use crate::infrastructure::processors::{
    concurrency, explicit_provider, metadata_with_frames, split_filename, target_frame_indices,
};
use crate::infrastructure::runtime::parallel::parallel_map;

const DEFAULT_CONCURRENCY: usize = 4;

pub struct CenterProductProcessor;

#[async_trait]
impl Processor for CenterProductProcessor {
    fn id(&self) -> &str {
        "center-product"
    }

    fn display_name(&self) -> &str {
        "Center product"
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
            .image_transform(explicit_provider(options), Some(&context.ab_seed()))?;
        let provider = selection.provider;

        let extracted_dir = context.work_dirs().extracted();
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
                let out_path = extracted_dir.join(format!("{stem}_centered{extension}"));
                async move {
                    let rewritten = provider.center_product(&path, &out_path).await?;
                    Ok((index, rewritten))
                }
            },
        )
        .await;

        if outcome.success_count == 0 {
            return Err(PipelineError::processing_failed(
                "centering failed for every frame",
            ));
        }
        if outcome.error_count > 0 {
            warn!(failed = outcome.error_count, "centering failed for some frames");
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
