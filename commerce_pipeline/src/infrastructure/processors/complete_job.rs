// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Job Completion Processor
//!
//! The canonical stack closer. Publishes the result summary under the
//! `resultSummary` metadata extension and terminates the stack via the
//! executor's `skip` semantics; the one legitimate use of `skip`. The job
//! lifecycle layer owns the actual terminal transition; this processor only
//! seals the data.

use async_trait::async_trait;

use commerce_pipeline_domain::{
    DataPatch, PipelineData, PipelineError, PipelineMetadata, Processor, ProcessorContext,
    ProcessorIo, JobResult, StepOptions, StepOutput,
};

pub const RESULT_EXTENSION_KEY: &str = "resultSummary";

pub struct CompleteJobProcessor;

#[async_trait]
impl Processor for CompleteJobProcessor {
    fn id(&self) -> &str {
        "complete-job"
    }

    fn display_name(&self) -> &str {
        "Complete job"
    }

    fn status_key(&self) -> &str {
        "finalizing"
    }

    fn io(&self) -> ProcessorIo {
        ProcessorIo::new([], [])
    }

    async fn execute(
        &self,
        context: &ProcessorContext,
        data: &PipelineData,
        _options: &StepOptions,
    ) -> Result<StepOutput, PipelineError> {
        context.check_cancelled("job completion")?;

        let result = JobResult::summarize(data);
        let mut extensions = data.metadata.extensions.clone();
        extensions.insert(
            RESULT_EXTENSION_KEY.to_string(),
            serde_json::to_value(&result)?,
        );

        Ok(StepOutput::terminate(DataPatch {
            metadata: Some(PipelineMetadata {
                extensions,
                ..data.metadata.clone()
            }),
            ..Default::default()
        }))
    }
}
