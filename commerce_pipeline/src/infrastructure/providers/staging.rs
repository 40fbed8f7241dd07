// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Staging Providers
//!
//! Deterministic local implementations of every provider kind, used by the
//! staging templates and the test suite. They operate purely on sandbox
//! files (no network, no models) and derive all "analysis" from content
//! hashes so that repeated runs over the same input produce identical
//! output. Registered only when the staging provider mode is selected (see
//! the parent module); production deployments register real integrations
//! instead, and the processor suite cannot tell the difference, which is
//! the point.
//!
//! ## Staging Video Container
//!
//! A staging "video" is any file. Files starting with the `CPVID` magic
//! carry a small header that controls probing:
//!
//! ```text
//! CPVID
//! duration=30
//! fps=30
//! audio=1
//!
//! <payload bytes…>
//! ```
//!
//! Headerless files probe as `duration = max(1, len/65536)`, 30 fps, no
//! audio. Audio payloads may embed `TRANSCRIPT:<text>` to control the
//! staging transcriber.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use commerce_pipeline_domain::services::providers::{
    AlphaReport, BackgroundRemovalProvider, ClassificationInput, ClassificationProvider,
    CommercialImageProvider, FrameClassification, ImageTransformProvider,
    ProductExtractionProvider, ProviderInfo, TranscriptionProvider, UnifiedAnalysis,
    UnifiedAnalysisSpec, UnifiedAnalyzerProvider, UpscaleProvider, VideoExtractionProvider,
    VideoProbe,
};
use commerce_pipeline_domain::{CommercialVersion, PipelineError, ProductMetadata};

const STAGING_MAGIC: &str = "CPVID";
const TRANSCRIPT_MARKER: &str = "TRANSCRIPT:";
const HEADERLESS_BYTES_PER_SEC: u64 = 64 * 1024;

/// Parsed staging container.
struct StagingVideo {
    duration_secs: f64,
    fps: f64,
    has_audio: bool,
    payload: Vec<u8>,
}

async fn read_staging_video(path: &Path) -> Result<StagingVideo, PipelineError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        PipelineError::io_error(format!("cannot read video {}: {}", path.display(), e))
    })?;

    let text_prefix = String::from_utf8_lossy(&bytes[..bytes.len().min(256)]).into_owned();
    if let Some(rest) = text_prefix.strip_prefix(STAGING_MAGIC) {
        let mut duration_secs = 1.0f64;
        let mut fps = 30.0f64;
        let mut has_audio = false;
        let mut header_len = STAGING_MAGIC.len();
        // The first lines() element is the empty remainder of the magic
        // line; only a later blank line ends the header.
        let mut in_fields = false;
        for line in rest.lines() {
            header_len += line.len() + 1;
            let line = line.trim();
            if line.is_empty() {
                if in_fields {
                    break;
                }
                continue;
            }
            in_fields = true;
            if let Some((key, value)) = line.split_once('=') {
                match key {
                    "duration" => duration_secs = value.parse().unwrap_or(duration_secs),
                    "fps" => fps = value.parse().unwrap_or(fps),
                    "audio" => has_audio = value == "1" || value == "true",
                    _ => {}
                }
            }
        }
        let payload = bytes.get(header_len.min(bytes.len())..).unwrap_or(&[]).to_vec();
        return Ok(StagingVideo {
            duration_secs: duration_secs.max(0.1),
            fps,
            has_audio,
            payload,
        });
    }

    Ok(StagingVideo {
        duration_secs: ((bytes.len() as u64 / HEADERLESS_BYTES_PER_SEC).max(1)) as f64,
        fps: 30.0,
        has_audio: false,
        payload: bytes,
    })
}

fn content_hash(bytes: &[u8]) -> u64 {
    let digest = Sha256::digest(bytes);
    u64::from_be_bytes(digest[..8].try_into().unwrap_or([0; 8]))
}

async fn hash_file(path: &Path) -> Result<u64, PipelineError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        PipelineError::io_error(format!("cannot read {}: {}", path.display(), e))
    })?;
    Ok(content_hash(&bytes))
}

async fn copy_artifact(source: &Path, target: &Path) -> Result<PathBuf, PipelineError> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            PipelineError::io_error(format!("cannot create {}: {}", parent.display(), e))
        })?;
    }
    tokio::fs::copy(source, target).await.map_err(|e| {
        PipelineError::io_error(format!(
            "cannot copy {} to {}: {}",
            source.display(),
            target.display(),
            e
        ))
    })?;
    Ok(target.to_path_buf())
}

/// Frame/audio extraction over the staging container.
pub struct StagingVideoExtraction;

impl ProviderInfo for StagingVideoExtraction {
    fn id(&self) -> &str {
        "staging"
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[async_trait]
impl VideoExtractionProvider for StagingVideoExtraction {
    async fn probe(&self, video: &Path) -> Result<VideoProbe, PipelineError> {
        let parsed = read_staging_video(video).await?;
        Ok(VideoProbe {
            duration_secs: parsed.duration_secs,
            fps: parsed.fps,
            has_audio: parsed.has_audio,
        })
    }

    async fn extract_frame(
        &self,
        video: &Path,
        timestamp: f64,
        out_path: &Path,
    ) -> Result<PathBuf, PipelineError> {
        let parsed = read_staging_video(video).await?;
        if timestamp < 0.0 || timestamp > parsed.duration_secs {
            return Err(PipelineError::provider_permanent(format!(
                "timestamp {:.2}s outside video duration {:.2}s",
                timestamp, parsed.duration_secs
            )));
        }

        // A deterministic window of the payload stands in for the decoded
        // frame, so the same (video, timestamp) always yields the same bytes.
        let window = 4096usize;
        let span = parsed.payload.len().saturating_sub(window);
        let offset = if parsed.duration_secs > 0.0 {
            ((timestamp / parsed.duration_secs) * span as f64) as usize
        } else {
            0
        };
        let slice = parsed
            .payload
            .get(offset..(offset + window).min(parsed.payload.len()))
            .unwrap_or(&[]);

        let mut frame = format!("CPFRM ts={timestamp:.3}\n").into_bytes();
        frame.extend_from_slice(slice);
        if let Some(parent) = out_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                PipelineError::io_error(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        tokio::fs::write(out_path, frame).await.map_err(|e| {
            PipelineError::io_error(format!("cannot write {}: {}", out_path.display(), e))
        })?;
        Ok(out_path.to_path_buf())
    }

    async fn extract_audio(
        &self,
        video: &Path,
        out_path: &Path,
    ) -> Result<Option<PathBuf>, PipelineError> {
        let parsed = read_staging_video(video).await?;
        if !parsed.has_audio {
            return Ok(None);
        }
        tokio::fs::write(out_path, &parsed.payload).await.map_err(|e| {
            PipelineError::io_error(format!("cannot write {}: {}", out_path.display(), e))
        })?;
        Ok(Some(out_path.to_path_buf()))
    }
}

/// Background removal that passes the image through untouched.
pub struct StagingBackgroundRemoval {
    id: String,
}

impl StagingBackgroundRemoval {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl ProviderInfo for StagingBackgroundRemoval {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[async_trait]
impl BackgroundRemovalProvider for StagingBackgroundRemoval {
    async fn remove_background(
        &self,
        image: &Path,
        out_path: &Path,
    ) -> Result<PathBuf, PipelineError> {
        copy_artifact(image, out_path).await
    }
}

/// Copy-based transforms with hash-derived alpha analysis.
pub struct StagingImageTransform;

impl ProviderInfo for StagingImageTransform {
    fn id(&self) -> &str {
        "staging"
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[async_trait]
impl ImageTransformProvider for StagingImageTransform {
    async fn center_product(
        &self,
        image: &Path,
        out_path: &Path,
    ) -> Result<PathBuf, PipelineError> {
        copy_artifact(image, out_path).await
    }

    async fn analyze_alpha(&self, image: &Path) -> Result<AlphaReport, PipelineError> {
        let hash = hash_file(image).await?;
        Ok(AlphaReport {
            transparent_ratio: (hash % 500) as f64 / 1000.0,
            hole_count: (hash % 4) as usize,
            notes: Vec::new(),
        })
    }
}

/// Hash-derived classification: stable verdicts per frame content.
pub struct StagingClassification;

impl ProviderInfo for StagingClassification {
    fn id(&self) -> &str {
        "staging"
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[async_trait]
impl ClassificationProvider for StagingClassification {
    async fn classify_frames(
        &self,
        frames: &[ClassificationInput],
        _model: &str,
    ) -> Result<Vec<FrameClassification>, PipelineError> {
        let mut verdicts = Vec::with_capacity(frames.len());
        for frame in frames {
            let hash = hash_file(&frame.path).await?;
            let accepted = hash % 10 != 0;
            verdicts.push(FrameClassification {
                frame_id: frame.frame_id,
                accepted,
                product_id: accepted.then(|| format!("prod-{}", hash % 3)),
                variant_id: accepted.then(|| format!("var-{}", hash % 5)),
                angle_estimate: accepted.then(|| {
                    ["front", "back", "left", "right", "top"][(hash % 5) as usize].to_string()
                }),
                rotation_angle_deg: accepted.then(|| ((hash % 72) * 5) as f64 - 180.0),
                obstructions: if hash % 7 == 0 {
                    vec!["hand".to_string()]
                } else {
                    Vec::new()
                },
                background_recommendations: vec!["solid".to_string()],
                is_final_selection: accepted && hash % 4 == 0,
            });
        }
        Ok(verdicts)
    }
}

/// Hash-derived product metadata.
pub struct StagingProductExtraction;

impl ProviderInfo for StagingProductExtraction {
    fn id(&self) -> &str {
        "staging"
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[async_trait]
impl ProductExtractionProvider for StagingProductExtraction {
    async fn extract_product(
        &self,
        frames: &[PathBuf],
        transcript: Option<&str>,
        _model: &str,
    ) -> Result<ProductMetadata, PipelineError> {
        let first = frames.first().ok_or_else(|| {
            PipelineError::provider_permanent("product extraction needs at least one frame")
        })?;
        let hash = hash_file(first).await?;
        Ok(ProductMetadata {
            title: format!("Product {:06x}", hash & 0xffffff),
            description: transcript.map(|t| format!("As described: {}", t)),
            brand: Some(format!("Brand-{}", hash % 9)),
            category: Some("general".to_string()),
            attributes: serde_json::Map::new(),
        })
    }
}

/// Commercial synthesis that stamps the version onto a copy of the frame.
pub struct StagingCommercialImage;

impl ProviderInfo for StagingCommercialImage {
    fn id(&self) -> &str {
        "staging"
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[async_trait]
impl CommercialImageProvider for StagingCommercialImage {
    async fn generate(
        &self,
        frame: &Path,
        version: CommercialVersion,
        _product: Option<&ProductMetadata>,
        out_path: &Path,
    ) -> Result<PathBuf, PipelineError> {
        let mut bytes = format!("CPCOM version={}\n", version).into_bytes();
        bytes.extend(tokio::fs::read(frame).await.map_err(|e| {
            PipelineError::io_error(format!("cannot read {}: {}", frame.display(), e))
        })?);
        if let Some(parent) = out_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                PipelineError::io_error(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        tokio::fs::write(out_path, bytes).await.map_err(|e| {
            PipelineError::io_error(format!("cannot write {}: {}", out_path.display(), e))
        })?;
        Ok(out_path.to_path_buf())
    }
}

/// No-op upscaler.
pub struct StagingUpscale;

impl ProviderInfo for StagingUpscale {
    fn id(&self) -> &str {
        "staging"
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[async_trait]
impl UpscaleProvider for StagingUpscale {
    async fn upscale(&self, image: &Path, out_path: &Path) -> Result<PathBuf, PipelineError> {
        copy_artifact(image, out_path).await
    }
}

/// Transcriber over the staging audio payload.
pub struct StagingTranscription;

impl ProviderInfo for StagingTranscription {
    fn id(&self) -> &str {
        "staging"
    }

    fn is_available(&self) -> bool {
        true
    }
}

fn transcript_from_payload(payload: &[u8]) -> String {
    let text = String::from_utf8_lossy(payload);
    if let Some(index) = text.find(TRANSCRIPT_MARKER) {
        let rest = &text[index + TRANSCRIPT_MARKER.len()..];
        return rest.lines().next().unwrap_or("").trim().to_string();
    }
    format!("spoken content {:08x}", content_hash(payload) & 0xffff_ffff)
}

#[async_trait]
impl TranscriptionProvider for StagingTranscription {
    async fn transcribe(&self, audio: &Path) -> Result<String, PipelineError> {
        let payload = tokio::fs::read(audio).await.map_err(|e| {
            PipelineError::io_error(format!("cannot read {}: {}", audio.display(), e))
        })?;
        Ok(transcript_from_payload(&payload))
    }
}

/// Single-pass analyzer composing the other staging behaviors.
pub struct StagingUnifiedAnalyzer;

impl ProviderInfo for StagingUnifiedAnalyzer {
    fn id(&self) -> &str {
        "staging"
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[async_trait]
impl UnifiedAnalyzerProvider for StagingUnifiedAnalyzer {
    async fn analyze_video(
        &self,
        video: &Path,
        spec: &UnifiedAnalysisSpec,
    ) -> Result<UnifiedAnalysis, PipelineError> {
        let parsed = read_staging_video(video).await?;
        let hash = content_hash(&parsed.payload);

        let transcript = parsed
            .has_audio
            .then(|| transcript_from_payload(&parsed.payload))
            .filter(|t| !t.is_empty());

        let frame_count = spec
            .max_frames
            .min(parsed.duration_secs.ceil() as usize)
            .max(1);
        let selected_timestamps: Vec<f64> = (0..frame_count)
            .map(|i| (i as f64 + 0.5) * parsed.duration_secs / frame_count as f64)
            .collect();

        Ok(UnifiedAnalysis {
            transcript,
            product: ProductMetadata {
                title: format!("Product {:06x}", hash & 0xffffff),
                description: None,
                brand: Some(format!("Brand-{}", hash % 9)),
                category: Some("general".to_string()),
                attributes: serde_json::Map::new(),
            },
            selected_timestamps,
        })
    }
}
