// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Hole Detection Processor
//!
//! Debug stage for the background-removal pipeline: runs alpha analysis
//! over every frame and publishes an aggregate report under the
//! `holeReport` metadata extension (the escape-hatch path outside the closed
//! vocabulary). Frames are not modified.

use async_trait::async_trait;
use std::sync::Arc;

use commerce_pipeline_domain::services::providers::ImageTransformProvider;
use commerce_pipeline_domain::{
    DataPatch, DataPath, PipelineData, PipelineError, PipelineMetadata, Processor,
    ProcessorContext, ProcessorIo, StepOptions, StepOutput,
};

use crate::infrastructure::processors::{concurrency, explicit_provider};
use crate::infrastructure::runtime::parallel::parallel_map;

const DEFAULT_CONCURRENCY: usize = 4;
const EXTENSION_KEY: &str = "holeReport";

pub struct DetectHolesProcessor;

#[async_trait]
impl Processor for DetectHolesProcessor {
    fn id(&self) -> &str {
        "detect-holes"
    }

    fn display_name(&self) -> &str {
        "Detect silhouette holes"
    }

    fn status_key(&self) -> &str {
        "generating"
    }

    fn io(&self) -> ProcessorIo {
        ProcessorIo::new(
            [DataPath::Frames],
            [DataPath::Custom(EXTENSION_KEY.to_string())],
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
            .image_transform(explicit_provider(options), Some(&context.ab_seed()))?;
        let provider = selection.provider;

        let items: Vec<(String, std::path::PathBuf)> = data
            .metadata
            .frames
            .iter()
            .map(|f| (f.frame_id.to_string(), f.path.clone()))
            .collect();

        let provider_for_items = Arc::clone(&provider);
        let outcome = parallel_map(
            items,
            concurrency(options, DEFAULT_CONCURRENCY),
            context.cancellation(),
            move |_, (frame_id, path)| {
                let provider = Arc::clone(&provider_for_items);
                async move {
                    let report = provider.analyze_alpha(&path).await?;
                    Ok((frame_id, report))
                }
            },
        )
        .await;

        if outcome.success_count == 0 {
            return Err(PipelineError::processing_failed(
                "alpha analysis failed for every frame",
            ));
        }

        let per_frame: Vec<serde_json::Value> = outcome
            .into_successes()
            .into_iter()
            .map(|(frame_id, report)| {
                serde_json::json!({
                    "frameId": frame_id,
                    "holeCount": report.hole_count,
                    "transparentRatio": report.transparent_ratio,
                })
            })
            .collect();
        let frames_with_holes = per_frame
            .iter()
            .filter(|r| r["holeCount"].as_u64().unwrap_or(0) > 0)
            .count();

        let mut extensions = data.metadata.extensions.clone();
        extensions.insert(
            EXTENSION_KEY.to_string(),
            serde_json::json!({
                "framesWithHoles": frames_with_holes,
                "frames": per_frame,
            }),
        );

        Ok(StepOutput::advance(DataPatch {
            metadata: Some(PipelineMetadata {
                extensions,
                ..data.metadata.clone()
            }),
            ..Default::default()
        }))
    }
}
