// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Perceptual Scoring Processor
//!
//! Scores every frame without a codec dependency:
//!
//! - **sharpness**: the deflate incompressibility ratio of the frame
//!   payload. Detail-rich frames compress poorly; flat or blurry frames
//!   compress well. Normalized to `[0, 1]`.
//! - **motion**: mean absolute byte distance between a frame's sample
//!   window and its predecessor's, normalized to `[0, 1]`; the first frame
//!   scores zero motion.
//! - **score**: `0.7 · sharpness + 0.3 · (1 − motion)`, preferring detailed,
//!   stable frames.
//!
//! One frame per wall-clock second is flagged `is_best_per_second`. The
//! metrics only need to *order* candidate frames; swapping in a model-backed
//! scorer is a provider change, not a contract change.

use async_trait::async_trait;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::io::Write;
use tracing::warn;

use commerce_pipeline_domain::{
    DataPatch, DataPath, PipelineData, PipelineError, Processor, ProcessorContext, ProcessorIo,
    StepOptions, StepOutput,
};

use crate::infrastructure::processors::{concurrency, metadata_with_frames};
use crate::infrastructure::runtime::parallel::parallel_map;

const DEFAULT_CONCURRENCY: usize = 8;
const SAMPLE_WINDOW: usize = 4096;

pub struct ScoreFramesProcessor;

fn deflate_ratio(bytes: &[u8]) -> f64 {
    if bytes.is_empty() {
        return 0.0;
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
    if encoder.write_all(bytes).is_err() {
        return 0.0;
    }
    match encoder.finish() {
        Ok(compressed) => (compressed.len() as f64 / bytes.len() as f64).clamp(0.0, 1.0),
        Err(_) => 0.0,
    }
}

fn sample_distance(a: &[u8], b: &[u8]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let len = a.len().min(b.len());
    let sum: u64 = a[..len]
        .iter()
        .zip(&b[..len])
        .map(|(x, y)| u64::from(x.abs_diff(*y)))
        .sum();
    (sum as f64 / (len as f64 * 255.0)).clamp(0.0, 1.0)
}

#[async_trait]
impl Processor for ScoreFramesProcessor {
    fn id(&self) -> &str {
        "score-frames"
    }

    fn display_name(&self) -> &str {
        "Score frames"
    }

    fn status_key(&self) -> &str {
        "scoring"
    }

    fn io(&self) -> ProcessorIo {
        ProcessorIo::new([DataPath::Frames], [DataPath::FrameScores])
    }

    async fn execute(
        &self,
        context: &ProcessorContext,
        data: &PipelineData,
        options: &StepOptions,
    ) -> Result<StepOutput, PipelineError> {
        let paths: Vec<std::path::PathBuf> =
            data.metadata.frames.iter().map(|f| f.path.clone()).collect();

        // Pass 1 (parallel): read each frame, compute sharpness, keep a
        // sample window for the sequential motion pass.
        let outcome = parallel_map(
            paths,
            concurrency(options, DEFAULT_CONCURRENCY),
            context.cancellation(),
            |_, path| async move {
                let bytes = tokio::fs::read(&path).await.map_err(|e| {
                    PipelineError::io_error(format!("cannot read frame {}: {}", path.display(), e))
                })?;
                let sharpness = deflate_ratio(&bytes);
                let sample = bytes[..bytes.len().min(SAMPLE_WINDOW)].to_vec();
                Ok((sharpness, sample))
            },
        )
        .await;

        if outcome.success_count == 0 {
            return Err(PipelineError::processing_failed(
                "no frame could be read for scoring",
            ));
        }
        if outcome.error_count > 0 {
            warn!(failed = outcome.error_count, "some frames could not be scored");
        }

        // Pass 2 (sequential): motion against the previous readable frame,
        // combined score, best-per-second flags.
        let mut frames = data.metadata.frames.clone();
        let mut previous_sample: Option<Vec<u8>> = None;
        for (frame, result) in frames.iter_mut().zip(outcome.results) {
            let Ok((sharpness, sample)) = result else {
                continue;
            };
            let motion = previous_sample
                .as_deref()
                .map(|prev| sample_distance(prev, &sample))
                .unwrap_or(0.0);
            frame.sharpness = Some(sharpness);
            frame.motion = Some(motion);
            frame.score = Some(0.7 * sharpness + 0.3 * (1.0 - motion));
            frame.is_best_per_second = Some(false);
            previous_sample = Some(sample);
        }

        let mut best_per_second: HashMap<i64, (usize, f64)> = HashMap::new();
        for (index, frame) in frames.iter().enumerate() {
            if let Some(score) = frame.score {
                let second = frame.timestamp.floor() as i64;
                let entry = best_per_second.entry(second).or_insert((index, score));
                if score > entry.1 {
                    *entry = (index, score);
                }
            }
        }
        for (index, _) in best_per_second.values() {
            frames[*index].is_best_per_second = Some(true);
        }

        Ok(StepOutput::advance(DataPatch {
            metadata: Some(metadata_with_frames(data, frames)),
            ..Default::default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deflate_ratio_orders_by_detail() {
        let flat = vec![0u8; 8192];
        let detailed: Vec<u8> = (0..8192u32)
            .map(|i| (i.wrapping_mul(2654435761) >> 24) as u8)
            .collect();
        assert!(deflate_ratio(&detailed) > deflate_ratio(&flat));
        assert_eq!(deflate_ratio(&[]), 0.0);
    }

    #[test]
    fn test_sample_distance_bounds() {
        assert_eq!(sample_distance(&[0, 0], &[255, 255]), 1.0);
        assert_eq!(sample_distance(&[9, 9], &[9, 9]), 0.0);
        assert_eq!(sample_distance(&[], &[1]), 0.0);
    }
}
