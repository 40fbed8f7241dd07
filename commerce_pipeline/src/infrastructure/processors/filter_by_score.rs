// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Score Filter Processor
//!
//! One of the two stages allowed to drop whole frames. Keeps frames that
//! clear the score threshold (`min_score`, default 0) and, by default,
//! only the best frame of each second. Survivor order is preserved, and the
//! `images` mirror is rewritten to match. Rejecting every frame fails the
//! step; there is nothing left to process downstream.

use async_trait::async_trait;
use tracing::debug;

use commerce_pipeline_domain::{
    DataPatch, DataPath, PipelineData, PipelineError, Processor, ProcessorContext, ProcessorIo,
    StepOptions, StepOutput,
};

use crate::infrastructure::processors::metadata_with_frames;

pub struct FilterByScoreProcessor;

#[async_trait]
impl Processor for FilterByScoreProcessor {
    fn id(&self) -> &str {
        "filter-by-score"
    }

    fn display_name(&self) -> &str {
        "Filter frames by score"
    }

    fn status_key(&self) -> &str {
        "scoring"
    }

    fn io(&self) -> ProcessorIo {
        ProcessorIo::new(
            [DataPath::Frames, DataPath::FrameScores],
            [DataPath::Frames, DataPath::Images],
        )
    }

    async fn execute(
        &self,
        context: &ProcessorContext,
        data: &PipelineData,
        options: &StepOptions,
    ) -> Result<StepOutput, PipelineError> {
        context.check_cancelled("score filtering")?;

        let min_score = options.get_f64("min_score").unwrap_or(0.0);
        let best_per_second_only = options.get_bool("best_per_second_only").unwrap_or(true);

        let before = data.metadata.frames.len();
        let frames: Vec<_> = data
            .metadata
            .frames
            .iter()
            .filter(|frame| {
                let score_ok = frame.score.is_some_and(|s| s >= min_score);
                let best_ok = !best_per_second_only || frame.is_best_per_second == Some(true);
                score_ok && best_ok
            })
            .cloned()
            .collect();

        if frames.is_empty() {
            return Err(PipelineError::processing_failed(
                "score filter rejected every frame",
            ));
        }
        debug!(before, after = frames.len(), min_score, "frames filtered by score");

        // Rejected frame files stay in the sandbox until cleanup; only the
        // records are dropped here.
        let images = frames.iter().map(|f| f.path.clone()).collect();
        Ok(StepOutput::advance(DataPatch {
            images: Some(images),
            metadata: Some(metadata_with_frames(data, frames)),
            ..Default::default()
        }))
    }
}
