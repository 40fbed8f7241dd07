// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stack Templates
//!
//! A stack is an ordered, named list of processor steps that together
//! implement one end-to-end pipeline. Templates are immutable and identified
//! by a stable snake_case id, which doubles as the cache key for computed IO
//! sets.
//!
//! Step conditions are declarative so templates stay serializable and
//! identity-comparable; the executor evaluates them against the running data
//! and the job configuration right before each step.

use serde::{Deserialize, Serialize};

use crate::entities::job::JobConfig;
use crate::entities::pipeline_data::PipelineData;
use crate::services::processor::StepOptions;
use crate::value_objects::DataPath;

/// Declarative per-step guard, evaluated at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepCondition {
    /// Run only when the data currently satisfies the given path.
    HasPath { path: DataPath },
    /// Run only when the named job-config flag is set. Known flags:
    /// `ai_cleanup`.
    ConfigFlag { flag: String },
}

impl StepCondition {
    /// Evaluates the condition against the running data and job config.
    pub fn evaluate(&self, data: &PipelineData, config: &JobConfig) -> bool {
        match self {
            StepCondition::HasPath { path } => data.satisfies(path),
            StepCondition::ConfigFlag { flag } => match flag.as_str() {
                "ai_cleanup" => config.ai_cleanup,
                _ => false,
            },
        }
    }
}

/// One step of a stack: a processor reference with optional options and an
/// optional runtime condition.
#[derive(Debug, Clone, PartialEq)]
pub struct StackStep {
    pub processor: String,
    pub options: StepOptions,
    pub condition: Option<StepCondition>,
}

impl StackStep {
    pub fn new(processor: impl Into<String>) -> Self {
        Self {
            processor: processor.into(),
            options: StepOptions::new(),
            condition: None,
        }
    }

    pub fn with_options(mut self, options: StepOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_condition(mut self, condition: StepCondition) -> Self {
        self.condition = Some(condition);
        self
    }
}

/// An immutable, reusable stack declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct StackTemplate {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<StackStep>,
}

impl StackTemplate {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        steps: Vec<StackStep>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            steps,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Step to insert after a named processor.
#[derive(Debug, Clone, PartialEq)]
pub struct StepInsertion {
    /// Processor id of the step to insert after; the first match wins.
    pub after: String,
    pub processor: String,
    pub options: StepOptions,
}

/// Modifier bundle applied to a stack before execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackConfig {
    /// `original processor id → replacement processor id`.
    pub processor_swaps: std::collections::BTreeMap<String, String>,
    pub insert_processors: Vec<StepInsertion>,
    /// `processor id → option overlay` (shallow).
    pub processor_options: std::collections::BTreeMap<String, StepOptions>,
    /// When true, a runtime IO requirement miss fails the job instead of
    /// logging a warning.
    pub strict_io_validation: bool,
}

impl StackConfig {
    pub fn is_empty(&self) -> bool {
        self.processor_swaps.is_empty()
            && self.insert_processors.is_empty()
            && self.processor_options.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_path_condition() {
        let cond = StepCondition::HasPath {
            path: DataPath::Audio,
        };
        let config = JobConfig::default();
        let mut data = PipelineData::default();
        assert!(!cond.evaluate(&data, &config));

        data.audio = Some(crate::entities::pipeline_data::AudioData {
            path: Some(std::path::PathBuf::from("/tmp/audio.wav")),
            has_audio: true,
        });
        assert!(cond.evaluate(&data, &config));
    }

    #[test]
    fn test_config_flag_condition() {
        let cond = StepCondition::ConfigFlag {
            flag: "ai_cleanup".into(),
        };
        let data = PipelineData::default();
        let mut config = JobConfig::default();
        assert!(!cond.evaluate(&data, &config));
        config.ai_cleanup = true;
        assert!(cond.evaluate(&data, &config));

        let unknown = StepCondition::ConfigFlag {
            flag: "does_not_exist".into(),
        };
        assert!(!unknown.evaluate(&data, &config));
    }
}
