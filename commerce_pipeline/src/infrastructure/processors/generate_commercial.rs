// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Commercial Synthesis Processor
//!
//! Fans out `final frames × configured versions` through the commercial
//! image provider. Each synthesized image becomes a *versioned* frame
//! record: fresh identity, `source_frame_id` linking back, persistence and
//! upload state reset. Source frames stay in the list; versioned copies are
//! appended in source-major order.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use commerce_pipeline_domain::services::providers::CommercialImageProvider;
use commerce_pipeline_domain::{
    CommercialVersion, DataPatch, DataPath, FrameMetadata, PipelineData, PipelineError, Processor,
    ProcessorContext, ProcessorIo, StepOptions, StepOutput,
};

use crate::infrastructure::processors::{
    concurrency, explicit_provider, metadata_with_frames, split_filename, target_frame_indices,
};
use crate::infrastructure::runtime::parallel::parallel_map;

const DEFAULT_CONCURRENCY: usize = 4;

pub struct GenerateCommercialProcessor;

fn configured_versions(
    context: &ProcessorContext,
    options: &StepOptions,
) -> Result<Vec<CommercialVersion>, PipelineError> {
    if let Some(value) = options.get("versions") {
        let names: Vec<String> = serde_json::from_value(value.clone())
            .map_err(|e| PipelineError::validation(format!("bad versions option: {}", e)))?;
        return names.iter().map(|n| n.parse()).collect();
    }
    Ok(context.config().commercial_versions.iter().copied().collect())
}

#[async_trait]
impl Processor for GenerateCommercialProcessor {
    fn id(&self) -> &str {
        "generate-commercial"
    }

    fn display_name(&self) -> &str {
        "Generate commercial images"
    }

    fn status_key(&self) -> &str {
        "generating"
    }

    fn io(&self) -> ProcessorIo {
        ProcessorIo::new(
            [DataPath::Frames],
            [DataPath::FrameVersion, DataPath::Frames, DataPath::Images],
        )
    }

    async fn execute(
        &self,
        context: &ProcessorContext,
        data: &PipelineData,
        options: &StepOptions,
    ) -> Result<StepOutput, PipelineError> {
        let selection = context
            .providers()
            .commercial_image(explicit_provider(options), Some(&context.ab_seed()))?;
        let provider = selection.provider;

        let versions = configured_versions(context, options)?;
        if versions.is_empty() {
            return Err(PipelineError::precondition(
                "no commercial versions configured for this job",
            ));
        }

        let product = data.metadata.product_metadata.clone();
        let commercial_dir = context.work_dirs().commercial();

        // Source-major fan-out: every target frame times every version.
        let jobs: Vec<(FrameMetadata, CommercialVersion)> = target_frame_indices(data)
            .into_iter()
            .flat_map(|index| {
                let frame = data.metadata.frames[index].clone();
                versions
                    .iter()
                    .map(move |version| (frame.clone(), *version))
            })
            .collect();
        let job_count = jobs.len();

        let provider_for_items = Arc::clone(&provider);
        let outcome = parallel_map(
            jobs,
            concurrency(options, DEFAULT_CONCURRENCY),
            context.cancellation(),
            move |_, (frame, version)| {
                let provider = Arc::clone(&provider_for_items);
                let product = product.clone();
                let (stem, _) = split_filename(&frame.filename);
                let filename = format!("{stem}_{version}.png");
                let out_path = commercial_dir.join(&filename);
                async move {
                    let path = provider
                        .generate(&frame.path, version, product.as_ref(), &out_path)
                        .await?;
                    Ok(frame.versioned_copy(version, filename, path))
                }
            },
        )
        .await;

        if outcome.success_count == 0 {
            return Err(PipelineError::processing_failed(format!(
                "commercial synthesis failed for all {} frame/version pairs",
                job_count
            )));
        }
        if outcome.error_count > 0 {
            warn!(
                failed = outcome.error_count,
                generated = outcome.success_count,
                "some commercial images failed to synthesize"
            );
        }

        let mut frames = data.metadata.frames.clone();
        frames.extend(outcome.into_successes());
        let images = frames.iter().map(|f| f.path.clone()).collect();

        Ok(StepOutput::advance(DataPatch {
            images: Some(images),
            metadata: Some(metadata_with_frames(data, frames)),
            ..Default::default()
        }))
    }
}
