// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Built-in Processor Suite
//!
//! Reference implementations of every pipeline stage. Each processor follows
//! the same shape: declare IO, resolve providers through the registry
//! (honoring a per-step `provider` option for explicit selection and the
//! job seed for A/B routing), run per-item work through the bounded parallel
//! map, and return a shallow patch carrying the full metadata union.

pub mod center_product;
pub mod classify;
pub mod complete_job;
pub mod detect_holes;
pub mod download;
pub mod extract_audio;
pub mod extract_frames;
pub mod filter_by_score;
pub mod generate_commercial;
pub mod persist_frames;
pub mod product_metadata;
pub mod remove_background;
pub mod score_frames;
pub mod transcribe;
pub mod unified_analyzer;
pub mod upload_frames;
pub mod upscale;

use std::sync::Arc;

use commerce_pipeline_domain::{
    FrameMetadata, PipelineData, PipelineError, PipelineMetadata, ProcessorRegistry, StepOptions,
};

/// Registers the whole built-in suite. Called once at startup, before the
/// registry is sealed.
pub fn register_builtin_processors(
    registry: &ProcessorRegistry,
) -> Result<(), PipelineError> {
    registry.register(Arc::new(download::DownloadProcessor::new()?))?;
    registry.register(Arc::new(extract_frames::ExtractFramesProcessor))?;
    registry.register(Arc::new(extract_audio::ExtractAudioProcessor))?;
    registry.register(Arc::new(score_frames::ScoreFramesProcessor))?;
    registry.register(Arc::new(filter_by_score::FilterByScoreProcessor))?;
    registry.register(Arc::new(classify::GeminiClassifyProcessor))?;
    registry.register(Arc::new(product_metadata::ExtractProductMetadataProcessor))?;
    registry.register(Arc::new(remove_background::RemoveBackgroundProcessor))?;
    registry.register(Arc::new(center_product::CenterProductProcessor))?;
    registry.register(Arc::new(upscale::UpscaleProcessor))?;
    registry.register(Arc::new(transcribe::TranscribeProcessor))?;
    registry.register(Arc::new(unified_analyzer::UnifiedVideoAnalyzerProcessor))?;
    registry.register(Arc::new(generate_commercial::GenerateCommercialProcessor))?;
    registry.register(Arc::new(persist_frames::PersistFramesProcessor))?;
    registry.register(Arc::new(upload_frames::UploadFramesProcessor))?;
    registry.register(Arc::new(detect_holes::DetectHolesProcessor))?;
    registry.register(Arc::new(complete_job::CompleteJobProcessor))?;
    Ok(())
}

/// The `provider` step option selects a provider implementation explicitly.
pub(crate) fn explicit_provider(options: &StepOptions) -> Option<&str> {
    options.get_str("provider")
}

/// Per-item fan-out width for a step.
pub(crate) fn concurrency(options: &StepOptions, default: usize) -> usize {
    options
        .get_u64("concurrency")
        .map(|c| c.max(1) as usize)
        .unwrap_or(default)
}

/// The metadata union with a replaced frame list; processors that touch
/// frames return this so the executor's shallow merge keeps the rest of the
/// metadata intact.
pub(crate) fn metadata_with_frames(
    data: &PipelineData,
    frames: Vec<FrameMetadata>,
) -> PipelineMetadata {
    PipelineMetadata {
        frames,
        ..data.metadata.clone()
    }
}

/// The frames a product-centric stage should operate on: the classifier's
/// final selection when present, otherwise every current frame.
pub(crate) fn target_frame_indices(data: &PipelineData) -> Vec<usize> {
    let finals: Vec<usize> = data
        .metadata
        .frames
        .iter()
        .enumerate()
        .filter(|(_, f)| f.is_final_selection == Some(true))
        .map(|(i, _)| i)
        .collect();
    if finals.is_empty() {
        (0..data.metadata.frames.len()).collect()
    } else {
        finals
    }
}

/// Splits `name.ext` into (stem, ".ext"-including-dot-or-empty).
pub(crate) fn split_filename(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(index) if index > 0 => (&filename[..index], &filename[index..]),
        _ => (filename, ""),
    }
}
