// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Frame Upload Processor
//!
//! Uploads frame images to the blob store under the canonical
//! `jobs/<jobId>/<subPath>/<filename>` layout and stamps the returned URLs
//! onto the frames. Uploads are keyed by path and therefore idempotent
//! across redeliveries; frames that already carry a URL are skipped.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use commerce_pipeline_domain::repositories::blob_store::blob_key;
use commerce_pipeline_domain::BlobStore;
use commerce_pipeline_domain::{
    DataPatch, DataPath, FrameMetadata, PipelineData, PipelineError, Processor, ProcessorContext,
    ProcessorIo, StepOptions, StepOutput,
};

use crate::infrastructure::processors::{concurrency, metadata_with_frames};
use crate::infrastructure::runtime::parallel::parallel_map;

const DEFAULT_CONCURRENCY: usize = 6;

pub struct UploadFramesProcessor;

fn sub_path_for(frame: &FrameMetadata) -> &'static str {
    if frame.version.is_some() {
        "commercial"
    } else if frame.has_classification() {
        "extracted"
    } else {
        "frames"
    }
}

#[async_trait]
impl Processor for UploadFramesProcessor {
    fn id(&self) -> &str {
        "upload-frames"
    }

    fn display_name(&self) -> &str {
        "Upload frames"
    }

    fn status_key(&self) -> &str {
        "uploading"
    }

    fn io(&self) -> ProcessorIo {
        ProcessorIo::new([DataPath::Frames], [DataPath::FrameS3Url])
    }

    async fn execute(
        &self,
        context: &ProcessorContext,
        data: &PipelineData,
        options: &StepOptions,
    ) -> Result<StepOutput, PipelineError> {
        let store = Arc::clone(context.blob_store()?);
        let job_id = *context.job_id();

        let items: Vec<(usize, String, std::path::PathBuf)> = data
            .metadata
            .frames
            .iter()
            .enumerate()
            .filter(|(_, frame)| frame.s3_url.is_none())
            .map(|(index, frame)| {
                let key = blob_key(&job_id, sub_path_for(frame), &frame.filename);
                (index, key, frame.path.clone())
            })
            .collect();
        if items.is_empty() {
            return Ok(StepOutput::noop());
        }
        let upload_count = items.len();

        let outcome = parallel_map(
            items,
            concurrency(options, DEFAULT_CONCURRENCY),
            context.cancellation(),
            move |_, (index, key, path)| {
                let store = Arc::clone(&store);
                async move {
                    let url = store.put_file(&key, &path).await?;
                    Ok((index, url))
                }
            },
        )
        .await;

        if outcome.success_count == 0 {
            return Err(PipelineError::processing_failed(format!(
                "all {} frame uploads failed",
                upload_count
            )));
        }
        if outcome.error_count > 0 {
            warn!(failed = outcome.error_count, "some frame uploads failed");
        }

        let mut frames = data.metadata.frames.clone();
        for (index, url) in outcome.into_successes() {
            frames[index].s3_url = Some(url);
        }

        Ok(StepOutput::advance(DataPatch {
            metadata: Some(metadata_with_frames(data, frames)),
            ..Default::default()
        }))
    }
}
