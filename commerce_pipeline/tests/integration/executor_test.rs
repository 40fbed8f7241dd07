// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Stack executor behavior against small purpose-built processors, plus
//! validator integration with the real built-in registry.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use commerce_pipeline::infrastructure::runtime::StackExecutor;
use commerce_pipeline::infrastructure::templates;
use commerce_pipeline_domain::services::processor::{Processor, ProcessorIo, StepOutput};
use commerce_pipeline_domain::services::stack_validator::{validate_stack, validate_swaps};
use commerce_pipeline_domain::{
    DataPatch, DataPath, JobConfig, JobId, PipelineData, PipelineError, PipelineMetadata,
    ProcessorContext, ProcessorRegistry, ProviderRegistry, StackConfig, StackStep, StackTemplate,
    StepCondition, StepOptions, WorkDirs,
};

use crate::common::RecordingSink;

/// A tiny scripted processor: produces one text marker, counts invocations.
struct MarkerProcessor {
    id: &'static str,
    io: ProcessorIo,
    skip: bool,
    fail: bool,
    calls: Arc<AtomicUsize>,
}

impl MarkerProcessor {
    fn new(id: &'static str, io: ProcessorIo) -> Arc<Self> {
        Arc::new(Self {
            id,
            io,
            skip: false,
            fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn skipping(id: &'static str) -> Arc<Self> {
        Arc::new(Self {
            id,
            io: ProcessorIo::new([], []),
            skip: true,
            fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn failing(id: &'static str) -> Arc<Self> {
        Arc::new(Self {
            id,
            io: ProcessorIo::new([], []),
            skip: false,
            fail: true,
            calls: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Processor for MarkerProcessor {
    fn id(&self) -> &str {
        self.id
    }

    fn display_name(&self) -> &str {
        self.id
    }

    fn status_key(&self) -> &str {
        "scoring"
    }

    fn io(&self) -> ProcessorIo {
        self.io.clone()
    }

    async fn execute(
        &self,
        _context: &ProcessorContext,
        data: &PipelineData,
        _options: &StepOptions,
    ) -> Result<StepOutput, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PipelineError::processing_failed(format!(
                "{} exploded",
                self.id
            )));
        }
        let mut extensions = data.metadata.extensions.clone();
        extensions.insert(self.id.to_string(), serde_json::json!(true));
        let patch = DataPatch {
            metadata: Some(PipelineMetadata {
                extensions,
                ..data.metadata.clone()
            }),
            ..Default::default()
        };
        if self.skip {
            Ok(StepOutput::terminate(patch))
        } else {
            Ok(StepOutput::advance(patch))
        }
    }
}

fn context(tmp: &tempfile::TempDir) -> ProcessorContext {
    let job_id = JobId::new();
    ProcessorContext::new(
        job_id,
        "tester",
        JobConfig::default(),
        WorkDirs::create(tmp.path(), &job_id).unwrap(),
        Arc::new(ProviderRegistry::new()),
    )
}

fn stack_of(processors: &[&str]) -> StackTemplate {
    StackTemplate::new(
        "test_stack",
        "Test stack",
        processors.iter().map(|p| StackStep::new(*p)).collect(),
    )
}

#[tokio::test]
async fn test_empty_stack_returns_initial_data_unchanged() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = Arc::new(ProcessorRegistry::new());
    let executor = StackExecutor::new(registry);

    let initial = PipelineData::for_video_source("https://host/x.mp4");
    let outcome = executor
        .execute(&stack_of(&[]), &StackConfig::default(), &context(&tmp), initial.clone())
        .await
        .unwrap();

    assert_eq!(outcome.data, initial);
    assert_eq!(outcome.executed_steps, 0);
    assert!(!outcome.terminated_early);
}

#[tokio::test]
async fn test_steps_run_in_order_and_merge() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = Arc::new(ProcessorRegistry::new());
    registry
        .register(MarkerProcessor::new("first", ProcessorIo::new([], [])))
        .unwrap();
    registry
        .register(MarkerProcessor::new("second", ProcessorIo::new([], [])))
        .unwrap();
    let executor = StackExecutor::new(registry);

    let outcome = executor
        .execute(
            &stack_of(&["first", "second"]),
            &StackConfig::default(),
            &context(&tmp),
            PipelineData::default(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.executed_steps, 2);
    assert!(outcome.data.metadata.extensions.contains_key("first"));
    assert!(outcome.data.metadata.extensions.contains_key("second"));
}

#[tokio::test]
async fn test_noop_stack_leaves_data_unchanged() {
    struct NoopProcessor;

    #[async_trait]
    impl Processor for NoopProcessor {
        fn id(&self) -> &str {
            "noop"
        }

        fn display_name(&self) -> &str {
            "Noop"
        }

        fn status_key(&self) -> &str {
            "scoring"
        }

        fn io(&self) -> ProcessorIo {
            ProcessorIo::new([], [])
        }

        async fn execute(
            &self,
            _context: &ProcessorContext,
            _data: &PipelineData,
            _options: &StepOptions,
        ) -> Result<StepOutput, PipelineError> {
            Ok(StepOutput::noop())
        }
    }

    let tmp = tempfile::tempdir().unwrap();
    let registry = Arc::new(ProcessorRegistry::new());
    registry.register(Arc::new(NoopProcessor)).unwrap();
    let executor = StackExecutor::new(registry);

    let initial = PipelineData::for_video_source("https://host/x.mp4");
    let outcome = executor
        .execute(
            &stack_of(&["noop", "noop"]),
            &StackConfig::default(),
            &context(&tmp),
            initial.clone(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.data, initial);
    assert_eq!(outcome.executed_steps, 2);
}

#[tokio::test]
async fn test_skip_terminates_stack_early() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = Arc::new(ProcessorRegistry::new());
    let closer = MarkerProcessor::skipping("closer");
    let after = MarkerProcessor::new("after", ProcessorIo::new([], []));
    let after_calls = Arc::clone(&after.calls);
    registry.register(closer).unwrap();
    registry.register(after).unwrap();
    let executor = StackExecutor::new(registry);

    let outcome = executor
        .execute(
            &stack_of(&["closer", "after"]),
            &StackConfig::default(),
            &context(&tmp),
            PipelineData::default(),
        )
        .await
        .unwrap();

    assert!(outcome.terminated_early);
    assert_eq!(outcome.executed_steps, 1);
    assert_eq!(after_calls.load(Ordering::SeqCst), 0, "post-skip step ran");
    // The skip patch still merged.
    assert!(outcome.data.metadata.extensions.contains_key("closer"));
}

#[tokio::test]
async fn test_processor_failure_aborts_stack() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = Arc::new(ProcessorRegistry::new());
    registry.register(MarkerProcessor::failing("boom")).unwrap();
    let survivor = MarkerProcessor::new("survivor", ProcessorIo::new([], []));
    let survivor_calls = Arc::clone(&survivor.calls);
    registry.register(survivor).unwrap();
    let executor = StackExecutor::new(registry);

    let error = executor
        .execute(
            &stack_of(&["boom", "survivor"]),
            &StackConfig::default(),
            &context(&tmp),
            PipelineData::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(error, PipelineError::ProcessingFailed(_)));
    assert_eq!(survivor_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_condition_skips_step_without_failing() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = Arc::new(ProcessorRegistry::new());
    let conditional = MarkerProcessor::new("conditional", ProcessorIo::new([], []));
    let calls = Arc::clone(&conditional.calls);
    registry.register(conditional).unwrap();
    let executor = StackExecutor::new(registry);

    let template = StackTemplate::new(
        "conditional_stack",
        "Conditional",
        vec![StackStep::new("conditional").with_condition(StepCondition::HasPath {
            path: DataPath::Audio,
        })],
    );

    let outcome = executor
        .execute(
            &template,
            &StackConfig::default(),
            &context(&tmp),
            PipelineData::default(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.executed_steps, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_strict_io_validation_fails_lax_warns() {
    // "claims-text" declares that it produces `text` but returns an empty
    // patch, so static validation passes while the runtime pre-check of the
    // next step sees unsatisfied data.
    let tmp = tempfile::tempdir().unwrap();
    let registry = Arc::new(ProcessorRegistry::new());
    registry
        .register(MarkerProcessor::new(
            "claims-text",
            ProcessorIo::new([], [DataPath::Text]),
        ))
        .unwrap();
    let needs_text = MarkerProcessor::new("needs-text", ProcessorIo::new([DataPath::Text], []));
    let needs_text_calls = Arc::clone(&needs_text.calls);
    registry.register(needs_text).unwrap();
    let executor = StackExecutor::new(registry);

    let template = stack_of(&["claims-text", "needs-text"]);

    // Lax mode: warn and continue.
    let outcome = executor
        .execute(
            &template,
            &StackConfig::default(),
            &context(&tmp),
            PipelineData::default(),
        )
        .await
        .unwrap();
    assert_eq!(outcome.executed_steps, 2);
    assert!(outcome
        .warnings
        .iter()
        .any(|w| w.contains("needs-text") && w.contains("'text'")));

    // Strict mode: abort with a precondition failure before the step runs.
    needs_text_calls.store(0, Ordering::SeqCst);
    let strict = StackConfig {
        strict_io_validation: true,
        ..Default::default()
    };
    let error = executor
        .execute(&template, &strict, &context(&tmp), PipelineData::default())
        .await
        .unwrap_err();
    assert!(matches!(error, PipelineError::Precondition(_)));
    assert_eq!(needs_text_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_progress_is_monotonic_and_status_keyed() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = Arc::new(ProcessorRegistry::new());
    for id in ["a", "b", "c"] {
        registry
            .register(MarkerProcessor::new(id, ProcessorIo::new([], [])))
            .unwrap();
    }
    let executor = StackExecutor::new(registry);
    let sink = RecordingSink::new();
    let context = context(&tmp).with_progress_sink(sink.clone());

    executor
        .execute(
            &stack_of(&["a", "b", "c"]),
            &StackConfig::default(),
            &context,
            PipelineData::default(),
        )
        .await
        .unwrap();

    sink.assert_monotonic();
    let updates = sink.updates.lock().unwrap();
    assert!(!updates.is_empty());
    assert_eq!(updates.last().unwrap().percentage, 100.0);
    assert!(updates.iter().all(|u| u.status_key == "scoring"));
}

#[tokio::test]
async fn test_cancelled_context_aborts_at_step_boundary() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = Arc::new(ProcessorRegistry::new());
    let never_runs = MarkerProcessor::new("never-runs", ProcessorIo::new([], []));
    let calls = Arc::clone(&never_runs.calls);
    registry.register(never_runs).unwrap();
    let executor = StackExecutor::new(registry);

    let cancel = commerce_pipeline_domain::CancellationToken::new();
    cancel.cancel();
    let context = context(&tmp).with_cancellation(cancel);

    let error = executor
        .execute(
            &stack_of(&["never-runs"]),
            &StackConfig::default(),
            &context,
            PipelineData::default(),
        )
        .await
        .unwrap_err();

    assert!(error.is_cancellation());
    assert_eq!(calls.load(Ordering::SeqCst), 0, "cancelled run executed a step");
}

#[tokio::test]
async fn test_unregistered_processor_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let executor = StackExecutor::new(Arc::new(ProcessorRegistry::new()));
    let error = executor
        .execute(
            &stack_of(&["ghost"]),
            &StackConfig::default(),
            &context(&tmp),
            PipelineData::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(error, PipelineError::Validation(_)));
}

#[tokio::test]
async fn test_incompatible_swap_refuses_to_start() {
    // Scenario: swap a frames-producer for a text-producer. The executor
    // must refuse before running anything.
    let tmp = tempfile::tempdir().unwrap();
    let registry = Arc::new(ProcessorRegistry::new());
    let original = MarkerProcessor::new(
        "makes-images",
        ProcessorIo::new([], [DataPath::Images]),
    );
    let calls = Arc::clone(&original.calls);
    registry.register(original).unwrap();
    registry
        .register(MarkerProcessor::new(
            "makes-text",
            ProcessorIo::new([], [DataPath::Text]),
        ))
        .unwrap();
    let executor = StackExecutor::new(Arc::clone(&registry));

    let config = StackConfig {
        processor_swaps: BTreeMap::from([(
            "makes-images".to_string(),
            "makes-text".to_string(),
        )]),
        ..Default::default()
    };

    let report = validate_swaps(&config.processor_swaps, registry.as_ref());
    assert!(!report.valid);
    assert!(report.errors[0].contains("produces=[images]"));
    assert!(report.errors[0].contains("produces=[text]"));

    let error = executor
        .execute(
            &stack_of(&["makes-images"]),
            &config,
            &context(&tmp),
            PipelineData::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(error, PipelineError::Validation(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_builtin_stack_missing_requirement_named() {
    // Scenario: [download, gemini-classify] must fail validation citing the
    // missing images/frames requirement, against the real built-in registry.
    let registry = ProcessorRegistry::new();
    commerce_pipeline::infrastructure::processors::register_builtin_processors(&registry)
        .unwrap();

    let template = StackTemplate::new(
        "bad",
        "Bad",
        vec![StackStep::new("download"), StackStep::new("gemini-classify")],
    );
    let initial = std::collections::BTreeSet::from([DataPath::Video]);
    let report = validate_stack(&template, &registry, &initial);

    assert!(!report.valid);
    let message = &report.errors[0];
    assert!(
        message.contains("'images'") || message.contains("'frames'"),
        "{}",
        message
    );
    assert!(message.contains("gemini-classify"));
}

#[test]
fn test_all_builtin_templates_validate_from_video() {
    let registry = ProcessorRegistry::new();
    commerce_pipeline::infrastructure::processors::register_builtin_processors(&registry)
        .unwrap();

    // Templates that start from pre-extracted frames declare their own
    // initial needs; everything video-first must validate from `video`.
    let video_first = [
        "quick_test",
        "local_file",
        "full_staging",
        "no_upload",
        "gemini_video_test",
    ];
    for id in video_first {
        let template = templates::template_by_id(id).unwrap();
        let initial = std::collections::BTreeSet::from([DataPath::Video]);
        let report = validate_stack(&template, &registry, &initial);
        assert!(report.valid, "stack {} invalid: {:?}", id, report.errors);
    }

    let frames_first = [
        "classification_test",
        "bg_removal_test",
        "commercial_test",
        "upload_only",
        "claid_bg_removal_test",
        "hole_detection_debug",
    ];
    for id in frames_first {
        let template = templates::template_by_id(id).unwrap();
        let initial = std::collections::BTreeSet::from([
            DataPath::Images,
            DataPath::Frames,
            DataPath::FrameScores,
        ]);
        let report = validate_stack(&template, &registry, &initial);
        assert!(report.valid, "stack {} invalid: {:?}", id, report.errors);
    }
}
