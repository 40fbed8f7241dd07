// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stack Executor
//!
//! Drives a configured stack to completion: validate, then execute steps
//! strictly sequentially with per-step timing, progress reporting, runtime
//! IO pre-checks, cooperative cancellation, and the shallow-merge discipline.
//!
//! ## Algorithm
//!
//! 1. Validate the configured swaps, apply the [`StackConfig`] rewrites, and
//!    statically validate the resulting step list against the paths the
//!    initial data satisfies.
//! 2. For each step: cancellation checkpoint → condition → registry
//!    resolution (fatal if absent) → runtime IO pre-check (strict mode fails,
//!    lax mode warns) → timer scope → `execute` → merge.
//! 3. `skip = true` breaks out of the loop as a clean early termination.
//!
//! ## Guarantees
//!
//! - Steps run strictly sequentially; no processor observes a later step's
//!   data.
//! - Progress percentage is monotonically non-decreasing.
//! - The executor never retries a processor; any `Err` aborts the stack and
//!   propagates as the job failure.

use std::sync::Arc;

use commerce_pipeline_domain::services::stack_configurator::apply_config;
use commerce_pipeline_domain::services::stack_validator::{validate_stack, validate_swaps};
use commerce_pipeline_domain::{
    PipelineData, PipelineError, ProcessorContext, ProcessorRegistry, ProgressUpdate, StackConfig,
    StackTemplate, TimerSummary,
};
use tracing::{debug, info, warn};

/// Result of one stack execution.
#[derive(Debug)]
pub struct ExecutionOutcome {
    pub data: PipelineData,
    /// Steps that actually ran (conditional skips excluded).
    pub executed_steps: usize,
    /// Whether a processor terminated the stack early via `skip`.
    pub terminated_early: bool,
    pub timer: TimerSummary,
    pub warnings: Vec<String>,
}

/// Ordered, validated execution of processor stacks.
pub struct StackExecutor {
    processors: Arc<ProcessorRegistry>,
}

impl StackExecutor {
    pub fn new(processors: Arc<ProcessorRegistry>) -> Self {
        Self { processors }
    }

    pub fn registry(&self) -> &Arc<ProcessorRegistry> {
        &self.processors
    }

    /// Validates and runs `template` under `config`, threading `initial`
    /// through every step.
    pub async fn execute(
        &self,
        template: &StackTemplate,
        config: &StackConfig,
        context: &ProcessorContext,
        initial: PipelineData,
    ) -> Result<ExecutionOutcome, PipelineError> {
        let mut warnings = Vec::new();

        // Swap validation happens before the rewrite so an incompatible swap
        // refuses to start rather than failing mid-flight.
        let swap_report = validate_swaps(&config.processor_swaps, self.processors.as_ref());
        if !swap_report.valid {
            return Err(PipelineError::validation(swap_report.errors.join("; ")));
        }

        let configured = apply_config(template, config);
        for warning in &configured.warnings {
            warn!(stack = %template.id, "{}", warning);
        }
        warnings.extend(configured.warnings);

        let effective = StackTemplate {
            id: template.id.clone(),
            name: template.name.clone(),
            description: template.description.clone(),
            steps: configured.steps,
        };

        let initial_paths = initial.satisfied_paths();
        let report = validate_stack(&effective, self.processors.as_ref(), &initial_paths);
        if !report.valid {
            return Err(PipelineError::validation(report.errors.join("; ")));
        }

        let timer = context.timer();
        let total_steps = effective.steps.len() as u32;
        let mut data = initial;
        let mut executed_steps = 0usize;
        let mut terminated_early = false;
        let mut last_percentage = 0.0f32;

        for (index, step) in effective.steps.iter().enumerate() {
            context.check_cancelled(&format!("boundary of step '{}'", step.processor))?;

            if let Some(condition) = &step.condition {
                if !condition.evaluate(&data, context.config()) {
                    debug!(
                        stack = %effective.id,
                        step = index,
                        processor = %step.processor,
                        "condition not met, step skipped"
                    );
                    continue;
                }
            }

            let processor = self.processors.get(&step.processor).ok_or_else(|| {
                PipelineError::ProcessorNotFound(format!(
                    "step {} references unregistered processor '{}'",
                    index, step.processor
                ))
            })?;

            // Runtime IO pre-check against the data actually present, as
            // opposed to the static walk over declared produces above.
            for required in &processor.io().requires {
                if !data.satisfies(required) {
                    let finding = format!(
                        "processor '{}' requires '{}' which the current data does not satisfy",
                        step.processor,
                        required.as_str()
                    );
                    if config.strict_io_validation {
                        return Err(PipelineError::precondition(finding));
                    }
                    warn!(stack = %effective.id, step = index, "{}", finding);
                    warnings.push(finding);
                }
            }

            let percentage =
                next_percentage(&mut last_percentage, index as u32, total_steps);
            context.report_progress(progress_update(
                processor.status_key(),
                percentage,
                index as u32 + 1,
                total_steps,
                Some(format!("running {}", processor.display_name())),
                &data,
            ));

            timer.start_step(processor.id());
            let result = processor.execute(context, &data, &step.options).await;
            timer.finish_step();

            let output = result?;
            data.merge(output.patch);
            executed_steps += 1;

            if output.skip {
                debug!(
                    stack = %effective.id,
                    processor = %step.processor,
                    "stack terminated early by processor"
                );
                terminated_early = true;
                break;
            }
        }

        if total_steps > 0 {
            let final_status = effective
                .steps
                .last()
                .and_then(|step| self.processors.get(&step.processor))
                .map(|p| p.status_key().to_string())
                .unwrap_or_else(|| "processing".to_string());
            last_percentage = 100.0;
            context.report_progress(progress_update(
                &final_status,
                last_percentage,
                total_steps,
                total_steps,
                None,
                &data,
            ));
        }

        let summary = timer.finish();
        info!(
            stack = %effective.id,
            job = %context.job_id(),
            executed_steps,
            terminated_early,
            timing = %summary,
            "stack execution finished"
        );

        Ok(ExecutionOutcome {
            data,
            executed_steps,
            terminated_early,
            timer: summary,
            warnings,
        })
    }
}

fn next_percentage(last: &mut f32, index: u32, total: u32) -> f32 {
    let raw = if total == 0 {
        100.0
    } else {
        (index as f32 / total as f32) * 100.0
    };
    if raw > *last {
        *last = raw;
    }
    *last
}

fn progress_update(
    status_key: &str,
    percentage: f32,
    current_step: u32,
    total_steps: u32,
    message: Option<String>,
    data: &PipelineData,
) -> ProgressUpdate {
    let frames = &data.metadata.frames;
    let count_nonzero = |n: usize| u32::try_from(n).ok().filter(|n| *n > 0);
    let variants: std::collections::BTreeSet<&str> = frames
        .iter()
        .filter_map(|f| f.variant_id.as_deref())
        .collect();

    ProgressUpdate {
        status_key: status_key.to_string(),
        percentage,
        current_step,
        total_steps,
        message,
        frames_extracted: count_nonzero(frames.len()),
        frames_scored: count_nonzero(frames.iter().filter(|f| f.has_scores()).count()),
        variants_discovered: count_nonzero(variants.len()),
        images_generated: count_nonzero(frames.iter().filter(|f| f.version.is_some()).count()),
    }
}
