// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Product Metadata Processor
//!
//! Derives the structured product description from the final-selection
//! frames (plus the transcript when one exists) through the
//! product-extraction provider.

use async_trait::async_trait;
use std::path::PathBuf;

use commerce_pipeline_domain::services::providers::ProductExtractionProvider;
use commerce_pipeline_domain::{
    DataPatch, DataPath, PipelineData, PipelineError, PipelineMetadata, Processor,
    ProcessorContext, ProcessorIo, StepOptions, StepOutput,
};

use crate::infrastructure::processors::{explicit_provider, target_frame_indices};

pub struct ExtractProductMetadataProcessor;

#[async_trait]
impl Processor for ExtractProductMetadataProcessor {
    fn id(&self) -> &str {
        "extract-product-metadata"
    }

    fn display_name(&self) -> &str {
        "Extract product metadata"
    }

    fn status_key(&self) -> &str {
        "classifying"
    }

    fn io(&self) -> ProcessorIo {
        ProcessorIo::new([DataPath::Frames], [DataPath::ProductMetadata])
    }

    async fn execute(
        &self,
        context: &ProcessorContext,
        data: &PipelineData,
        options: &StepOptions,
    ) -> Result<StepOutput, PipelineError> {
        let selection = context
            .providers()
            .product_extraction(explicit_provider(options), Some(&context.ab_seed()))?;

        let frames: Vec<PathBuf> = target_frame_indices(data)
            .into_iter()
            .map(|i| data.metadata.frames[i].path.clone())
            .collect();
        let model = options
            .get_str("model")
            .unwrap_or(&context.config().gemini_model)
            .to_string();

        context.check_cancelled("product extraction")?;
        let started = std::time::Instant::now();
        let product = selection
            .provider
            .extract_product(&frames, data.metadata.transcript.as_deref(), &model)
            .await?;
        context
            .timer()
            .record_operation("extract_product", started.elapsed());

        if product.title.is_empty() {
            return Err(PipelineError::provider_permanent(
                "product extraction returned an empty title",
            ));
        }

        Ok(StepOutput::advance(DataPatch {
            metadata: Some(PipelineMetadata {
                product_metadata: Some(product),
                ..data.metadata.clone()
            }),
            ..Default::default()
        }))
    }
}
