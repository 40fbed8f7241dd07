// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! End-to-end stack scenarios over staging providers: the no-AI quick test,
//! classification over pre-extracted frames, and the unified video analyzer.

use std::sync::Arc;

use commerce_pipeline::infrastructure::templates;
use commerce_pipeline_domain::{
    DataPath, FrameMetadata, JobConfig, JobId, JobResult, PipelineData, ProcessorContext,
    StackConfig, VideoData, WorkDirs,
};

use crate::common::{build_runtime, fake_frame, staging_video, RecordingSink};

fn context_with_sink(
    tmp: &tempfile::TempDir,
    providers: Arc<commerce_pipeline::ProviderRegistry>,
    sink: Arc<RecordingSink>,
) -> ProcessorContext {
    let job_id = JobId::new();
    ProcessorContext::new(
        job_id,
        "tester",
        JobConfig::default(),
        WorkDirs::create(tmp.path(), &job_id).unwrap(),
        providers,
    )
    .with_progress_sink(sink)
}

#[tokio::test]
async fn test_quick_test_stack_no_ai() {
    let tmp = tempfile::tempdir().unwrap();
    let video = staging_video(tmp.path(), 30, false, None);
    let (_, providers, executor) = build_runtime();
    let sink = RecordingSink::new();
    let context = context_with_sink(&tmp, providers, sink.clone());

    let template = templates::template_by_id("quick_test").unwrap();
    let outcome = executor
        .execute(
            &template,
            &StackConfig::default(),
            &context,
            PipelineData::for_video_source(video.to_string_lossy()),
        )
        .await
        .unwrap();

    assert!(outcome.terminated_early, "complete-job must close the stack");

    let result = JobResult::summarize(&outcome.data);
    assert!(result.frames_analyzed >= 1);
    assert_eq!(result.variants_discovered, 0, "no classifier ran");
    assert!(result.commercial_images.is_empty(), "no commercial URLs");

    // Every surviving frame is scored and the images mirror matches.
    assert!(outcome.data.satisfies(&DataPath::FrameScores));
    assert_eq!(outcome.data.images, outcome.data.frame_image_paths());

    sink.assert_monotonic();
}

#[tokio::test]
async fn test_classification_only_over_preextracted_frames() {
    let tmp = tempfile::tempdir().unwrap();
    let (_, providers, executor) = build_runtime();
    let context = context_with_sink(&tmp, providers, RecordingSink::new());

    // Pre-extracted frames with matching base metadata.
    let mut initial = PipelineData::default();
    for index in 0..8 {
        let path = fake_frame(tmp.path(), index);
        initial.images.push(path.clone());
        initial.metadata.frames.push(FrameMetadata::new(
            path.file_name().unwrap().to_string_lossy().into_owned(),
            path,
            index as f64,
            index,
        ));
    }

    let template = templates::template_by_id("classification_test").unwrap();
    let outcome = executor
        .execute(&template, &StackConfig::default(), &context, initial)
        .await
        .unwrap();

    let result = JobResult::summarize(&outcome.data);
    assert!(result.variants_discovered >= 1);
    assert!(outcome.data.satisfies(&DataPath::FrameClassifications));

    // Rejected frames are removed; survivors keep their relative order.
    let indices: Vec<usize> = outcome.data.metadata.frames.iter().map(|f| f.index).collect();
    let mut sorted = indices.clone();
    sorted.sort_unstable();
    assert_eq!(indices, sorted);
    assert!(!indices.is_empty());

    // Every survivor is classified.
    assert!(outcome
        .data
        .metadata
        .frames
        .iter()
        .all(|f| f.has_classification()));
}

#[tokio::test]
async fn test_unified_analyzer_with_audio() {
    let tmp = tempfile::tempdir().unwrap();
    let video = staging_video(tmp.path(), 30, true, Some("a red ceramic travel mug"));
    let (_, providers, executor) = build_runtime();
    let context = context_with_sink(&tmp, providers, RecordingSink::new());

    // The analyzer consumes a localized video.
    let mut initial = PipelineData::default();
    initial.video = Some(VideoData {
        path: Some(video),
        ..Default::default()
    });

    let template = templates::template_by_id("gemini_video_test").unwrap();
    let outcome = executor
        .execute(&template, &StackConfig::default(), &context, initial)
        .await
        .unwrap();

    let data = &outcome.data;
    assert!(data
        .metadata
        .transcript
        .as_deref()
        .is_some_and(|t| !t.is_empty()));
    assert!(data
        .metadata
        .product_metadata
        .as_ref()
        .is_some_and(|p| !p.title.is_empty()));

    let frames = &data.metadata.frames;
    assert!(!frames.is_empty() && frames.len() <= 20);
    for frame in frames {
        assert!(
            (0.0..=30.0).contains(&frame.timestamp),
            "timestamp {} outside duration",
            frame.timestamp
        );
        assert!(frame.path.is_file(), "selected frame not materialized");
    }

    // Parallel extraction, ordered results.
    let indices: Vec<usize> = frames.iter().map(|f| f.index).collect();
    let mut sorted = indices.clone();
    sorted.sort_unstable();
    assert_eq!(indices, sorted);
}

#[tokio::test]
async fn test_hole_detection_debug_stack_publishes_extension() {
    let tmp = tempfile::tempdir().unwrap();
    let (_, providers, executor) = build_runtime();
    let context = context_with_sink(&tmp, providers, RecordingSink::new());

    let mut initial = PipelineData::default();
    for index in 0..3 {
        let path = fake_frame(tmp.path(), index);
        initial.images.push(path.clone());
        initial.metadata.frames.push(FrameMetadata::new(
            path.file_name().unwrap().to_string_lossy().into_owned(),
            path,
            index as f64,
            index,
        ));
    }

    let template = templates::template_by_id("hole_detection_debug").unwrap();
    let outcome = executor
        .execute(&template, &StackConfig::default(), &context, initial)
        .await
        .unwrap();

    let report = outcome
        .data
        .metadata
        .extensions
        .get("holeReport")
        .expect("hole report extension");
    assert!(report.get("framesWithHoles").is_some());
    assert_eq!(report["frames"].as_array().unwrap().len(), 3);
    assert!(outcome
        .data
        .satisfies(&DataPath::Custom("holeReport".into())));
}

#[tokio::test]
async fn test_commercial_fanout_creates_versioned_frames() {
    let tmp = tempfile::tempdir().unwrap();
    let (_, providers, executor) = build_runtime();
    let context = context_with_sink(&tmp, providers, RecordingSink::new());

    let mut initial = PipelineData::default();
    for index in 0..2 {
        let path = fake_frame(tmp.path(), index);
        initial.images.push(path.clone());
        let mut frame = FrameMetadata::new(
            path.file_name().unwrap().to_string_lossy().into_owned(),
            path,
            index as f64,
            index,
        );
        frame.product_id = Some("p1".into());
        frame.variant_id = Some(format!("v{index}"));
        frame.is_final_selection = Some(true);
        initial.metadata.frames.push(frame);
    }

    let template = templates::template_by_id("commercial_test").unwrap();
    let outcome = executor
        .execute(&template, &StackConfig::default(), &context, initial)
        .await
        .unwrap();

    // Default config: transparent + solid for each of the two finals.
    let versioned: Vec<_> = outcome
        .data
        .metadata
        .frames
        .iter()
        .filter(|f| f.version.is_some())
        .collect();
    assert_eq!(versioned.len(), 4);
    for copy in &versioned {
        assert!(copy.source_frame_id.is_some());
        assert!(copy.path.is_file());
    }

    let result = JobResult::summarize(&outcome.data);
    assert_eq!(result.commercial_images.len(), 2);
    for versions in result.commercial_images.values() {
        assert_eq!(versions.len(), 2);
    }
}
