// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Classification Processor
//!
//! Sends frames to the classification provider in batches of the job's
//! `batch_size`, fanning batches out through the parallel map. The second of
//! the two frame-dropping stages: frames the provider rejects are removed,
//! frames in failed batches are dropped with a warning, and survivor order
//! is preserved.
//!
//! After enrichment, every discovered `(product, variant)` pair is
//! guaranteed one final-selection frame: when the provider flagged none, the
//! highest-scoring accepted frame of each variant is promoted.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::warn;

use commerce_pipeline_domain::services::providers::{
    ClassificationInput, ClassificationProvider, FrameClassification,
};
use commerce_pipeline_domain::{
    DataPatch, DataPath, FrameId, FrameMetadata, PipelineData, PipelineError, Processor,
    ProcessorContext, ProcessorIo, StepOptions, StepOutput,
};

use crate::infrastructure::processors::{concurrency, explicit_provider, metadata_with_frames};
use crate::infrastructure::runtime::parallel::parallel_map;

const DEFAULT_BATCH_CONCURRENCY: usize = 2;

pub struct GeminiClassifyProcessor;

fn apply_classification(frame: &mut FrameMetadata, verdict: &FrameClassification) {
    frame.product_id = verdict.product_id.clone();
    frame.variant_id = verdict.variant_id.clone();
    frame.angle_estimate = verdict.angle_estimate.clone();
    frame.rotation_angle_deg = verdict.rotation_angle_deg;
    frame.obstructions = verdict.obstructions.clone();
    frame.background_recommendations = verdict.background_recommendations.clone();
    frame.is_final_selection = Some(verdict.is_final_selection);
}

/// Promotes one frame per discovered variant when the provider flagged no
/// final selections.
fn ensure_final_selections(frames: &mut [FrameMetadata]) {
    if frames.iter().any(|f| f.is_final_selection == Some(true)) {
        return;
    }
    let mut best_per_variant: BTreeMap<(String, String), (usize, f64)> = BTreeMap::new();
    for (index, frame) in frames.iter().enumerate() {
        let (Some(product), Some(variant)) = (&frame.product_id, &frame.variant_id) else {
            continue;
        };
        let score = frame.score.unwrap_or(0.0);
        let key = (product.clone(), variant.clone());
        let entry = best_per_variant.entry(key).or_insert((index, score));
        if score > entry.1 {
            *entry = (index, score);
        }
    }
    for (index, _) in best_per_variant.values() {
        frames[*index].is_final_selection = Some(true);
    }
}

#[async_trait]
impl Processor for GeminiClassifyProcessor {
    fn id(&self) -> &str {
        "gemini-classify"
    }

    fn display_name(&self) -> &str {
        "Classify frames"
    }

    fn status_key(&self) -> &str {
        "classifying"
    }

    fn io(&self) -> ProcessorIo {
        ProcessorIo::new(
            [DataPath::Images, DataPath::Frames],
            [DataPath::FrameClassifications, DataPath::Frames, DataPath::Images],
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
            .classification(explicit_provider(options), Some(&context.ab_seed()))?;
        let provider = selection.provider;

        let model = options
            .get_str("model")
            .unwrap_or(&context.config().gemini_model)
            .to_string();
        let batch_size = options
            .get_u64("batch_size")
            .map(|b| b.max(1) as usize)
            .unwrap_or(context.config().batch_size as usize);

        let batches: Vec<Vec<ClassificationInput>> = data
            .metadata
            .frames
            .chunks(batch_size)
            .map(|chunk| {
                chunk
                    .iter()
                    .map(|frame| ClassificationInput {
                        frame_id: frame.frame_id,
                        path: frame.path.clone(),
                        timestamp: frame.timestamp,
                    })
                    .collect()
            })
            .collect();
        let batch_count = batches.len();

        let provider_for_items = Arc::clone(&provider);
        let outcome = parallel_map(
            batches,
            concurrency(options, DEFAULT_BATCH_CONCURRENCY),
            context.cancellation(),
            move |_, batch| {
                let provider = Arc::clone(&provider_for_items);
                let model = model.clone();
                async move { provider.classify_frames(&batch, &model).await }
            },
        )
        .await;

        if outcome.success_count == 0 {
            let cause = outcome
                .first_error()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no batches ran".to_string());
            return Err(PipelineError::processing_failed(format!(
                "classification failed for all {} batches: {}",
                batch_count, cause
            )));
        }
        if outcome.error_count > 0 {
            warn!(
                failed_batches = outcome.error_count,
                "dropping frames from failed classification batches"
            );
        }

        let verdicts: HashMap<FrameId, FrameClassification> = outcome
            .into_successes()
            .into_iter()
            .flatten()
            .map(|verdict| (verdict.frame_id, verdict))
            .collect();

        let mut frames: Vec<FrameMetadata> = Vec::with_capacity(verdicts.len());
        for frame in &data.metadata.frames {
            let Some(verdict) = verdicts.get(&frame.frame_id) else {
                continue; // batch failed; frame dropped
            };
            if !verdict.accepted {
                continue; // provider rejected the frame
            }
            let mut enriched = frame.clone();
            apply_classification(&mut enriched, verdict);
            frames.push(enriched);
        }

        if frames.is_empty() {
            return Err(PipelineError::processing_failed(
                "classification rejected every frame",
            ));
        }
        ensure_final_selections(&mut frames);

        let images = frames.iter().map(|f| f.path.clone()).collect();
        Ok(StepOutput::advance(DataPatch {
            images: Some(images),
            metadata: Some(metadata_with_frames(data, frames)),
            ..Default::default()
        }))
    }
}
