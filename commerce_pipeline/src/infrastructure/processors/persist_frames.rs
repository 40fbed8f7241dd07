// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Frame Persistence Processor
//!
//! Writes the current frame records through the job store and stamps the
//! returned database ids back onto the frames. Re-entrant: frames that
//! already carry a `db_id` are skipped, so queue redelivery does not create
//! duplicate rows.

use async_trait::async_trait;

use commerce_pipeline_domain::JobStore;
use commerce_pipeline_domain::{
    DataPatch, DataPath, PipelineData, PipelineError, Processor, ProcessorContext, ProcessorIo,
    StepOptions, StepOutput,
};

use crate::infrastructure::processors::metadata_with_frames;

pub struct PersistFramesProcessor;

#[async_trait]
impl Processor for PersistFramesProcessor {
    fn id(&self) -> &str {
        "persist-frames"
    }

    fn display_name(&self) -> &str {
        "Persist frame records"
    }

    fn status_key(&self) -> &str {
        "uploading"
    }

    fn io(&self) -> ProcessorIo {
        ProcessorIo::new([DataPath::Frames], [DataPath::FrameDbId])
    }

    async fn execute(
        &self,
        context: &ProcessorContext,
        data: &PipelineData,
        _options: &StepOptions,
    ) -> Result<StepOutput, PipelineError> {
        let store = context.job_store()?;
        context.check_cancelled("frame persistence")?;

        let mut frames = data.metadata.frames.clone();
        let pending: Vec<usize> = frames
            .iter()
            .enumerate()
            .filter(|(_, f)| f.db_id.is_none())
            .map(|(i, _)| i)
            .collect();
        if pending.is_empty() {
            return Ok(StepOutput::noop());
        }

        let records: Vec<_> = pending.iter().map(|&i| frames[i].clone()).collect();
        let started = std::time::Instant::now();
        let ids = store.insert_frame_records(context.job_id(), &records).await?;
        context
            .timer()
            .record_operation("insert_frame_records", started.elapsed());

        for (&index, id) in pending.iter().zip(ids) {
            frames[index].db_id = Some(id);
        }

        Ok(StepOutput::advance(DataPatch {
            metadata: Some(metadata_with_frames(data, frames)),
            ..Default::default()
        }))
    }
}
