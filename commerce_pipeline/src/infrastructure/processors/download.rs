// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Download Processor
//!
//! Localizes the job's input reference into the sandbox: HTTP(S) URLs are
//! streamed to disk with bounded retry on transient failures; local paths
//! are copied. Produces `video` with a populated local `path`.

use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use commerce_pipeline_domain::{
    DataPatch, DataPath, PipelineData, PipelineError, Processor, ProcessorContext, ProcessorIo,
    StepOptions, StepOutput, VideoData,
};

const DOWNLOAD_ATTEMPTS: u32 = 3;
const DOWNLOAD_BACKOFF: Duration = Duration::from_secs(1);

pub struct DownloadProcessor {
    client: reqwest::Client,
}

impl DownloadProcessor {
    pub fn new() -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| PipelineError::internal(format!("cannot build http client: {}", e)))?;
        Ok(Self { client })
    }

    fn target_path(context: &ProcessorContext, source: &str) -> PathBuf {
        let extension = Path::new(source.split('?').next().unwrap_or(source))
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_else(|| ".mp4".to_string());
        context.work_dirs().video().join(format!("input{}", extension))
    }

    async fn fetch_remote(
        &self,
        context: &ProcessorContext,
        url: &str,
        target: &Path,
    ) -> Result<(), PipelineError> {
        let mut last_error = PipelineError::provider_transient("download not attempted");
        for attempt in 1..=DOWNLOAD_ATTEMPTS {
            context.check_cancelled("video download")?;
            match self.try_fetch(url, target).await {
                Ok(()) => return Ok(()),
                Err(error) if error.is_transient() && attempt < DOWNLOAD_ATTEMPTS => {
                    warn!(url, attempt, error = %error, "transient download failure, retrying");
                    tokio::time::sleep(DOWNLOAD_BACKOFF * attempt).await;
                    last_error = error;
                }
                Err(error) => return Err(error),
            }
        }
        Err(last_error)
    }

    async fn try_fetch(&self, url: &str, target: &Path) -> Result<(), PipelineError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            PipelineError::provider_transient(format!("cannot reach {}: {}", url, e))
        })?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(PipelineError::provider_transient(format!(
                "download of {} failed with status {}",
                url, status
            )));
        }
        if !status.is_success() {
            return Err(PipelineError::provider_permanent(format!(
                "download of {} failed with status {}",
                url, status
            )));
        }

        let mut file = tokio::fs::File::create(target).await.map_err(|e| {
            PipelineError::resource(format!("cannot create {}: {}", target.display(), e))
        })?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                PipelineError::provider_transient(format!("download stream broke: {}", e))
            })?;
            file.write_all(&chunk).await.map_err(|e| {
                PipelineError::resource(format!("cannot write {}: {}", target.display(), e))
            })?;
        }
        file.flush().await.map_err(|e| {
            PipelineError::resource(format!("cannot flush {}: {}", target.display(), e))
        })?;
        Ok(())
    }
}

#[async_trait]
impl Processor for DownloadProcessor {
    fn id(&self) -> &str {
        "download"
    }

    fn display_name(&self) -> &str {
        "Download video"
    }

    fn status_key(&self) -> &str {
        "downloading"
    }

    fn io(&self) -> ProcessorIo {
        ProcessorIo::new([DataPath::Video], [DataPath::Video])
    }

    async fn execute(
        &self,
        context: &ProcessorContext,
        data: &PipelineData,
        _options: &StepOptions,
    ) -> Result<StepOutput, PipelineError> {
        let video = data.video.clone().unwrap_or_default();

        // Re-entrant on redelivery: an already-localized video is kept.
        if let Some(path) = &video.path {
            if path.exists() {
                debug!(path = %path.display(), "video already localized");
                return Ok(StepOutput::noop());
            }
        }

        let source = video.source_url.clone().ok_or_else(|| {
            PipelineError::precondition("download needs a video source reference")
        })?;
        let target = Self::target_path(context, &source);

        let started = std::time::Instant::now();
        if source.starts_with("http://") || source.starts_with("https://") {
            self.fetch_remote(context, &source, &target).await?;
        } else {
            let local = Path::new(&source);
            if !local.is_file() {
                return Err(PipelineError::validation(format!(
                    "local video '{}' does not exist",
                    source
                )));
            }
            tokio::fs::copy(local, &target).await.map_err(|e| {
                PipelineError::resource(format!(
                    "cannot copy {} into sandbox: {}",
                    local.display(),
                    e
                ))
            })?;
        }
        context
            .timer()
            .record_operation("fetch_video", started.elapsed());

        Ok(StepOutput::advance(DataPatch {
            video: Some(VideoData {
                path: Some(target),
                source_url: Some(source),
                ..video
            }),
            ..Default::default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_path_keeps_extension() {
        let source = "https://host/clip.webm?token=abc";
        let extension = Path::new(source.split('?').next().unwrap())
            .extension()
            .unwrap();
        assert_eq!(extension, "webm");
    }

    #[test]
    fn test_io_contract() {
        let processor = DownloadProcessor::new().unwrap();
        let io = processor.io();
        assert_eq!(io.requires, vec![DataPath::Video]);
        assert_eq!(io.produces, vec![DataPath::Video]);
    }
}
