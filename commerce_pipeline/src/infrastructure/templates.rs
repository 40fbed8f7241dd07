// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Built-in Stack Catalogue
//!
//! The production and staging stack templates, keyed by stable snake_case
//! ids. Templates are immutable; per-run tweaks go through [`StackConfig`]
//! (swaps, insertions, option overlays).
//!
//! [`StackConfig`]: commerce_pipeline_domain::StackConfig

use commerce_pipeline_domain::{
    DataPath, StackStep, StackTemplate, StepCondition, StepOptions,
};

fn options(value: serde_json::Value) -> StepOptions {
    // Literal objects below; from_value only fails on non-objects.
    StepOptions::from_value(value).unwrap_or_default()
}

/// All built-in templates, catalogue order.
pub fn builtin_templates() -> Vec<StackTemplate> {
    vec![
        StackTemplate::new(
            "quick_test",
            "Quick test",
            vec![
                StackStep::new("download"),
                StackStep::new("extract-frames"),
                StackStep::new("score-frames"),
                StackStep::new("filter-by-score"),
                StackStep::new("complete-job"),
            ],
        )
        .with_description("Download, extract, score, filter. No AI stages."),
        StackTemplate::new(
            "local_file",
            "Local file",
            vec![
                StackStep::new("download"),
                StackStep::new("extract-frames"),
                StackStep::new("score-frames"),
                StackStep::new("filter-by-score"),
                StackStep::new("complete-job"),
            ],
        )
        .with_description("Quick test over a local video path instead of a URL."),
        StackTemplate::new(
            "classification_test",
            "Classification test",
            vec![
                StackStep::new("gemini-classify"),
                StackStep::new("complete-job"),
            ],
        )
        .with_description("Classification over pre-extracted frames."),
        StackTemplate::new(
            "bg_removal_test",
            "Background removal test",
            vec![
                StackStep::new("remove-background"),
                StackStep::new("complete-job"),
            ],
        )
        .with_description("Background removal over existing frames."),
        StackTemplate::new(
            "commercial_test",
            "Commercial synthesis test",
            vec![
                StackStep::new("generate-commercial"),
                StackStep::new("complete-job"),
            ],
        )
        .with_description("Commercial image fan-out over existing frames."),
        StackTemplate::new(
            "upload_only",
            "Upload only",
            vec![
                StackStep::new("upload-frames"),
                StackStep::new("complete-job"),
            ],
        )
        .with_description("Upload existing frames to the blob store."),
        StackTemplate::new(
            "full_staging",
            "Full staging pipeline",
            vec![
                StackStep::new("download"),
                StackStep::new("extract-frames"),
                StackStep::new("extract-audio"),
                StackStep::new("transcribe").with_condition(StepCondition::HasPath {
                    path: DataPath::Audio,
                }),
                StackStep::new("score-frames"),
                StackStep::new("filter-by-score"),
                StackStep::new("gemini-classify"),
                StackStep::new("extract-product-metadata"),
                StackStep::new("remove-background"),
                StackStep::new("center-product"),
                StackStep::new("upscale").with_condition(StepCondition::ConfigFlag {
                    flag: "ai_cleanup".into(),
                }),
                StackStep::new("generate-commercial"),
                StackStep::new("persist-frames"),
                StackStep::new("upload-frames"),
                StackStep::new("complete-job"),
            ],
        )
        .with_description("The complete pipeline against staging providers."),
        StackTemplate::new(
            "no_upload",
            "Full pipeline without persistence",
            vec![
                StackStep::new("download"),
                StackStep::new("extract-frames"),
                StackStep::new("score-frames"),
                StackStep::new("filter-by-score"),
                StackStep::new("gemini-classify"),
                StackStep::new("extract-product-metadata"),
                StackStep::new("remove-background"),
                StackStep::new("center-product"),
                StackStep::new("generate-commercial"),
                StackStep::new("complete-job"),
            ],
        )
        .with_description("Everything but persistence and upload."),
        StackTemplate::new(
            "gemini_video_test",
            "Unified analyzer test",
            vec![
                StackStep::new("gemini-unified-video-analyzer"),
                StackStep::new("complete-job"),
            ],
        )
        .with_description("Single-call whole-video analysis."),
        StackTemplate::new(
            "claid_bg_removal_test",
            "Claid background removal test",
            vec![
                StackStep::new("remove-background")
                    .with_options(options(serde_json::json!({"provider": "claid"}))),
                StackStep::new("complete-job"),
            ],
        )
        .with_description("Background removal pinned to the claid provider."),
        StackTemplate::new(
            "hole_detection_debug",
            "Hole detection debug",
            vec![
                StackStep::new("remove-background"),
                StackStep::new("detect-holes"),
                StackStep::new("complete-job"),
            ],
        )
        .with_description("Background removal plus silhouette-hole reporting."),
    ]
}

/// Looks up a built-in template by id.
pub fn template_by_id(id: &str) -> Option<StackTemplate> {
    builtin_templates().into_iter().find(|t| t.id == id)
}
