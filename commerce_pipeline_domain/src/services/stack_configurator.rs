// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stack Configurator
//!
//! Applies a [`StackConfig`] to a stack's step list with three composable
//! rewrites, in a fixed order:
//!
//! 1. **Swaps**: steps whose processor id is keyed in `processor_swaps` get
//!    the replacement id.
//! 2. **Insertions**: each insertion lands immediately after the *first*
//!    step matching its `after` id (documented tie-break). A missing target
//!    is a warning, not an error.
//! 3. **Option overlay**: per-processor option overlays are shallow-merged
//!    on top of each step's existing options.
//!
//! The result goes back through the validator with the same initial paths
//! before execution.

use crate::services::stack::{StackConfig, StackStep, StackTemplate};

/// A configured step list plus any non-fatal findings.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredStack {
    pub steps: Vec<StackStep>,
    pub warnings: Vec<String>,
}

/// Applies `config` to `stack`, returning the rewritten step list.
///
/// With an empty config the output equals the template's steps.
pub fn apply_config(stack: &StackTemplate, config: &StackConfig) -> ConfiguredStack {
    let mut steps = stack.steps.clone();
    let mut warnings = Vec::new();

    // 1. Swaps.
    for step in &mut steps {
        if let Some(replacement) = config.processor_swaps.get(&step.processor) {
            step.processor = replacement.clone();
        }
    }

    // 2. Insertions; first `after` match wins.
    for insertion in &config.insert_processors {
        match steps.iter().position(|s| s.processor == insertion.after) {
            Some(position) => {
                let step = StackStep::new(insertion.processor.clone())
                    .with_options(insertion.options.clone());
                steps.insert(position + 1, step);
            }
            None => {
                warnings.push(format!(
                    "insertion of '{}' skipped: no step '{}' in stack '{}'",
                    insertion.processor, insertion.after, stack.id
                ));
            }
        }
    }

    // 3. Option overlay.
    for step in &mut steps {
        if let Some(overlay) = config.processor_options.get(&step.processor) {
            step.options = step.options.overlaid_with(overlay);
        }
    }

    ConfiguredStack { steps, warnings }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::processor::StepOptions;
    use crate::services::stack::StepInsertion;
    use std::collections::BTreeMap;

    fn template() -> StackTemplate {
        StackTemplate::new(
            "quick_test",
            "Quick test",
            vec![
                StackStep::new("download"),
                StackStep::new("extract-frames").with_options(
                    StepOptions::from_value(serde_json::json!({"concurrency": 4})).unwrap(),
                ),
                StackStep::new("score-frames"),
                StackStep::new("complete-job"),
            ],
        )
    }

    #[test]
    fn test_empty_config_is_identity() {
        let stack = template();
        let configured = apply_config(&stack, &StackConfig::default());
        assert_eq!(configured.steps, stack.steps);
        assert!(configured.warnings.is_empty());
    }

    #[test]
    fn test_swap_replaces_processor_id() {
        let stack = template();
        let config = StackConfig {
            processor_swaps: BTreeMap::from([(
                "score-frames".to_string(),
                "score-frames-v2".to_string(),
            )]),
            ..Default::default()
        };
        let configured = apply_config(&stack, &config);
        assert_eq!(configured.steps[2].processor, "score-frames-v2");
        // Swapped steps keep their options.
        assert_eq!(configured.steps[1].options.get_u64("concurrency"), Some(4));
    }

    #[test]
    fn test_insertion_lands_after_first_match() {
        let stack = template();
        let config = StackConfig {
            insert_processors: vec![StepInsertion {
                after: "extract-frames".into(),
                processor: "detect-holes".into(),
                options: StepOptions::new(),
            }],
            ..Default::default()
        };
        let configured = apply_config(&stack, &config);
        let ids: Vec<&str> = configured.steps.iter().map(|s| s.processor.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "download",
                "extract-frames",
                "detect-holes",
                "score-frames",
                "complete-job"
            ]
        );
    }

    #[test]
    fn test_duplicate_insertion_target_first_match_wins() {
        let stack = StackTemplate::new(
            "dup",
            "Duplicate targets",
            vec![
                StackStep::new("upscale"),
                StackStep::new("score-frames"),
                StackStep::new("upscale"),
            ],
        );
        let config = StackConfig {
            insert_processors: vec![StepInsertion {
                after: "upscale".into(),
                processor: "detect-holes".into(),
                options: StepOptions::new(),
            }],
            ..Default::default()
        };
        let configured = apply_config(&stack, &config);
        let ids: Vec<&str> = configured.steps.iter().map(|s| s.processor.as_str()).collect();
        assert_eq!(
            ids,
            vec!["upscale", "detect-holes", "score-frames", "upscale"]
        );
    }

    #[test]
    fn test_insertion_with_missing_target_warns() {
        let stack = template();
        let config = StackConfig {
            insert_processors: vec![StepInsertion {
                after: "not-present".into(),
                processor: "detect-holes".into(),
                options: StepOptions::new(),
            }],
            ..Default::default()
        };
        let configured = apply_config(&stack, &config);
        assert_eq!(configured.steps.len(), stack.steps.len());
        assert_eq!(configured.warnings.len(), 1);
        assert!(configured.warnings[0].contains("not-present"));
    }

    #[test]
    fn test_option_overlay_is_shallow_merge() {
        let stack = template();
        let config = StackConfig {
            processor_options: BTreeMap::from([(
                "extract-frames".to_string(),
                StepOptions::from_value(serde_json::json!({"max_frames": 50})).unwrap(),
            )]),
            ..Default::default()
        };
        let configured = apply_config(&stack, &config);
        let options = &configured.steps[1].options;
        assert_eq!(options.get_u64("concurrency"), Some(4));
        assert_eq!(options.get_u64("max_frames"), Some(50));
    }

    #[test]
    fn test_overlay_applies_to_swapped_id() {
        // Overlay keys refer to the post-swap processor ids, because swaps
        // run first.
        let stack = template();
        let config = StackConfig {
            processor_swaps: BTreeMap::from([(
                "score-frames".to_string(),
                "score-frames-v2".to_string(),
            )]),
            processor_options: BTreeMap::from([(
                "score-frames-v2".to_string(),
                StepOptions::from_value(serde_json::json!({"threshold": 0.7})).unwrap(),
            )]),
            ..Default::default()
        };
        let configured = apply_config(&stack, &config);
        assert_eq!(configured.steps[2].options.get_f64("threshold"), Some(0.7));
    }
}
