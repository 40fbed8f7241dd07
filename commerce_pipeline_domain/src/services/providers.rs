// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Provider Ports
//!
//! One narrow trait per provider kind, covering exactly the method contract
//! the core consumes. Concrete integrations (Gemini, Claid, hosted
//! upscalers…) live outside this repository; the infrastructure layer ships
//! deterministic staging implementations for the staging templates and tests.
//!
//! Every provider reports `is_available()` from its configuration/secrets.
//! Selection does not consult availability (only the listing APIs filter by
//! it), so a misconfigured explicit selection fails loudly at call time
//! instead of silently falling back.
//!
//! Providers own transient-failure recovery: bounded retry with exponential
//! backoff happens inside the implementation, and only exhausted retries or
//! permanent failures escape as errors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::entities::pipeline_data::ProductMetadata;
use crate::value_objects::{CommercialVersion, FrameId};
use crate::PipelineError;

/// Shared identity/availability surface of every provider kind.
pub trait ProviderInfo: Send + Sync {
    /// Stable provider identifier, e.g. `gemini`, `claid`, `staging`.
    fn id(&self) -> &str;

    /// Whether the provider's configuration and secrets are in place.
    fn is_available(&self) -> bool;
}

/// Probe result for an input video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoProbe {
    pub duration_secs: f64,
    pub fps: f64,
    pub has_audio: bool,
}

/// Video frame/audio extraction.
#[async_trait]
pub trait VideoExtractionProvider: ProviderInfo {
    /// Probes container-level metadata.
    async fn probe(&self, video: &Path) -> Result<VideoProbe, PipelineError>;

    /// Extracts the frame nearest `timestamp` (seconds) into `out_path`.
    async fn extract_frame(
        &self,
        video: &Path,
        timestamp: f64,
        out_path: &Path,
    ) -> Result<PathBuf, PipelineError>;

    /// Extracts the audio track into `out_path`; `None` when the video has
    /// no audio.
    async fn extract_audio(
        &self,
        video: &Path,
        out_path: &Path,
    ) -> Result<Option<PathBuf>, PipelineError>;
}

/// Background removal; writes the cut-out image to `out_path`.
#[async_trait]
pub trait BackgroundRemovalProvider: ProviderInfo {
    async fn remove_background(
        &self,
        image: &Path,
        out_path: &Path,
    ) -> Result<PathBuf, PipelineError>;
}

/// Report from alpha-channel analysis of a cut-out image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlphaReport {
    /// Share of fully transparent pixels, `[0, 1]`.
    pub transparent_ratio: f64,
    /// Count of enclosed transparent regions inside the product silhouette.
    pub hole_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

/// Geometric image transforms and analysis.
#[async_trait]
pub trait ImageTransformProvider: ProviderInfo {
    /// Re-centers the product in the canvas, writing to `out_path`.
    async fn center_product(
        &self,
        image: &Path,
        out_path: &Path,
    ) -> Result<PathBuf, PipelineError>;

    /// Analyzes the alpha channel of a cut-out image (hole detection).
    async fn analyze_alpha(&self, image: &Path) -> Result<AlphaReport, PipelineError>;
}

/// One frame handed to classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationInput {
    pub frame_id: FrameId,
    pub path: PathBuf,
    pub timestamp: f64,
}

/// Classification verdict for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameClassification {
    pub frame_id: FrameId,
    /// Rejected frames are dropped from the pipeline by the classify stage.
    pub accepted: bool,
    pub product_id: Option<String>,
    pub variant_id: Option<String>,
    pub angle_estimate: Option<String>,
    pub rotation_angle_deg: Option<f64>,
    pub obstructions: Vec<String>,
    pub background_recommendations: Vec<String>,
    pub is_final_selection: bool,
}

/// AI frame classification.
#[async_trait]
pub trait ClassificationProvider: ProviderInfo {
    /// Classifies one batch of frames. The result covers every input frame,
    /// in input order.
    async fn classify_frames(
        &self,
        frames: &[ClassificationInput],
        model: &str,
    ) -> Result<Vec<FrameClassification>, PipelineError>;
}

/// Structured product-metadata extraction from final frames + transcript.
#[async_trait]
pub trait ProductExtractionProvider: ProviderInfo {
    async fn extract_product(
        &self,
        frames: &[PathBuf],
        transcript: Option<&str>,
        model: &str,
    ) -> Result<ProductMetadata, PipelineError>;
}

/// Commercial image synthesis for one background treatment.
#[async_trait]
pub trait CommercialImageProvider: ProviderInfo {
    async fn generate(
        &self,
        frame: &Path,
        version: CommercialVersion,
        product: Option<&ProductMetadata>,
        out_path: &Path,
    ) -> Result<PathBuf, PipelineError>;
}

/// Image upscaling / AI cleanup.
#[async_trait]
pub trait UpscaleProvider: ProviderInfo {
    async fn upscale(&self, image: &Path, out_path: &Path) -> Result<PathBuf, PipelineError>;
}

/// Speech-to-text over an extracted audio track.
#[async_trait]
pub trait TranscriptionProvider: ProviderInfo {
    async fn transcribe(&self, audio: &Path) -> Result<String, PipelineError>;
}

/// Parameters for a unified whole-video analysis call.
#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedAnalysisSpec {
    /// Upper bound on selected frames.
    pub max_frames: usize,
    pub model: String,
}

/// Result of a unified whole-video analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedAnalysis {
    pub transcript: Option<String>,
    pub product: ProductMetadata,
    /// Timestamps (seconds) of the frames the analyzer selected, within
    /// `[0, duration]`, at most `max_frames` entries.
    pub selected_timestamps: Vec<f64>,
}

/// Single-call video analyzer: transcript, product metadata, and frame
/// selection in one pass.
#[async_trait]
pub trait UnifiedAnalyzerProvider: ProviderInfo {
    async fn analyze_video(
        &self,
        video: &Path,
        spec: &UnifiedAnalysisSpec,
    ) -> Result<UnifiedAnalysis, PipelineError>;
}
