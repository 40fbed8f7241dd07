// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Run Stack Use Case
//!
//! Direct, queue-less execution of a stack template for the CLI: build the
//! registries, parse the options file, construct an ephemeral context, and
//! drive the executor. No credits, no durable job row; this is the
//! operator-facing path for trying stacks against the selected provider
//! set (staging by default; `production` requires a build with a linked
//! real-provider bundle).

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use commerce_pipeline_domain::{
    CancellationToken, JobConfig, JobId, PipelineData, PipelineError, ProcessorContext,
    ProcessorRegistry, ProviderRegistry, StackConfig, StepOptions, WorkDirs,
};

use crate::infrastructure::processors::register_builtin_processors;
use crate::infrastructure::providers::{register_providers, ProviderMode};
use crate::infrastructure::runtime::stack_executor::{ExecutionOutcome, StackExecutor};
use crate::infrastructure::templates;

/// Shape of the `--options` JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RunOptionsFile {
    /// Job configuration overrides.
    pub job: Option<JobConfig>,
    pub strict_io_validation: bool,
    pub processor_swaps: BTreeMap<String, String>,
    pub processor_options: BTreeMap<String, serde_json::Map<String, serde_json::Value>>,
}

impl RunOptionsFile {
    fn stack_config(&self) -> StackConfig {
        StackConfig {
            processor_swaps: self.processor_swaps.clone(),
            insert_processors: Vec::new(),
            processor_options: self
                .processor_options
                .iter()
                .map(|(id, map)| (id.clone(), StepOptions::from_map(map.clone())))
                .collect(),
            strict_io_validation: self.strict_io_validation,
        }
    }
}

/// Parameters of a direct run.
#[derive(Debug, Clone)]
pub struct RunStackRequest {
    pub stack_id: String,
    pub video: String,
    pub options_file: Option<PathBuf>,
    pub work_root: PathBuf,
    pub provider_mode: ProviderMode,
}

/// Builds the runtime and executes the requested stack once.
pub async fn run_stack(
    request: RunStackRequest,
    cancel: CancellationToken,
) -> Result<ExecutionOutcome, PipelineError> {
    let template = templates::template_by_id(&request.stack_id)
        .ok_or_else(|| PipelineError::StackNotFound(request.stack_id.clone()))?;

    let options = match &request.options_file {
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|e| {
                PipelineError::validation(format!(
                    "cannot read options file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            serde_json::from_str::<RunOptionsFile>(&raw)
                .map_err(|e| PipelineError::validation(format!("bad options file: {}", e)))?
        }
        None => RunOptionsFile::default(),
    };

    let processors = Arc::new(ProcessorRegistry::new());
    register_builtin_processors(&processors)?;
    processors.seal();

    let providers = Arc::new(ProviderRegistry::new());
    register_providers(&providers, request.provider_mode)?;

    let job_config = options.job.clone().unwrap_or_default();
    job_config.validate()?;

    let job_id = JobId::new();
    let work_dirs = WorkDirs::create(&request.work_root, &job_id)?;
    let context = ProcessorContext::new(job_id, "cli", job_config, work_dirs, providers)
        .with_cancellation(cancel);

    let executor = StackExecutor::new(processors);
    executor
        .execute(
            &template,
            &options.stack_config(),
            &context,
            PipelineData::for_video_source(request.video.clone()),
        )
        .await
}
