// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Processor Contract
//!
//! A processor is an identified unit of work with a declared IO contract and
//! a single `execute` entry point. The contract, in full:
//!
//! - **Declared IO is authoritative.** A processor must not read a data path
//!   it did not require, and must set every path it produces.
//! - **Non-destructive merge.** The returned [`DataPatch`] is shallow-merged
//!   onto the running [`PipelineData`]; a processor that extends `metadata`
//!   returns the union itself; the executor never deep-merges.
//! - **Skip semantics.** `skip = true` terminates the entire stack early with
//!   success (for closers like `complete-job`). A processor that wants a
//!   no-op returns an empty patch instead, so the next step still runs.
//! - **Error semantics.** An `Err` is fatal for the whole job. Transient
//!   failures are recovered inside providers; the message that escapes here
//!   is user-visible.
//! - **Idempotence is recommended, not required.** Re-execution over a
//!   processor's own output must not crash; this is what allows queue
//!   redelivery without per-stage resume code.
//! - **Cancellation.** Processors observe the context's token at suspension
//!   points, release acquired external resources, and return a cancellation
//!   error.
//!
//! [`PipelineData`]: crate::entities::pipeline_data::PipelineData

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::entities::pipeline_data::{DataPatch, PipelineData};
use crate::entities::processor_context::ProcessorContext;
use crate::value_objects::DataPath;
use crate::PipelineError;

/// Declared IO contract of a processor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessorIo {
    pub requires: Vec<DataPath>,
    pub produces: Vec<DataPath>,
}

impl ProcessorIo {
    pub fn new(
        requires: impl IntoIterator<Item = DataPath>,
        produces: impl IntoIterator<Item = DataPath>,
    ) -> Self {
        Self {
            requires: requires.into_iter().collect(),
            produces: produces.into_iter().collect(),
        }
    }

    /// Whether two IO contracts are interchangeable for swap purposes: the
    /// requires and produces sets must be identical (order-insensitive).
    pub fn is_swap_compatible(&self, other: &ProcessorIo) -> bool {
        let sort = |paths: &[DataPath]| {
            let mut v: Vec<DataPath> = paths.to_vec();
            v.sort();
            v
        };
        sort(&self.requires) == sort(&other.requires)
            && sort(&self.produces) == sort(&other.produces)
    }

    /// Renders the contract for diagnostics, e.g.
    /// `requires=[video] produces=[frames, images]`.
    pub fn describe(&self) -> String {
        let join = |paths: &[DataPath]| {
            paths
                .iter()
                .map(|p| p.as_str().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "requires=[{}] produces=[{}]",
            join(&self.requires),
            join(&self.produces)
        )
    }
}

/// Per-step options: a JSON object with typed accessors. Options come from
/// the stack template and may be overlaid by a [`StackConfig`].
///
/// [`StackConfig`]: crate::services::stack::StackConfig
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOptions(Map<String, Value>);

impl StepOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Builds options from a JSON value; non-objects are rejected.
    pub fn from_value(value: Value) -> Result<Self, PipelineError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(PipelineError::validation(format!(
                "step options must be a JSON object, got {}",
                other
            ))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    /// Shallow overlay: keys in `overlay` replace keys here.
    pub fn overlaid_with(&self, overlay: &StepOptions) -> StepOptions {
        let mut merged = self.0.clone();
        for (key, value) in &overlay.0 {
            merged.insert(key.clone(), value.clone());
        }
        StepOptions(merged)
    }

    pub fn inner(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Outcome of one processor execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutput {
    pub patch: DataPatch,
    /// Terminates the whole stack early with success. Not a per-processor
    /// no-op; see the module docs.
    pub skip: bool,
}

impl StepOutput {
    /// Continue with a data patch.
    pub fn advance(patch: DataPatch) -> Self {
        Self { patch, skip: false }
    }

    /// Continue unchanged; the processor-level no-op.
    pub fn noop() -> Self {
        Self::default()
    }

    /// Terminate the stack early with success.
    pub fn terminate(patch: DataPatch) -> Self {
        Self { patch, skip: true }
    }
}

/// An identified unit of pipeline work.
///
/// Processors are process-wide singletons registered once at startup;
/// identifiers are globally unique. There is no inheritance hierarchy,
/// composition only.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Globally unique identifier, e.g. `extract-frames`.
    fn id(&self) -> &str;

    /// Human-readable name for listings and logs.
    fn display_name(&self) -> &str;

    /// The job-status key this processor maps to while running, e.g.
    /// `scoring`.
    fn status_key(&self) -> &str;

    /// Declared IO contract.
    fn io(&self) -> ProcessorIo;

    /// Executes the unit of work. May suspend at provider calls, file IO,
    /// and parallel fan-outs; must observe the context's cancellation token
    /// at those points.
    async fn execute(
        &self,
        context: &ProcessorContext,
        data: &PipelineData,
        options: &StepOptions,
    ) -> Result<StepOutput, PipelineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_compatibility_is_order_insensitive() {
        let a = ProcessorIo::new(
            [DataPath::Frames, DataPath::Images],
            [DataPath::FrameScores],
        );
        let b = ProcessorIo::new(
            [DataPath::Images, DataPath::Frames],
            [DataPath::FrameScores],
        );
        let c = ProcessorIo::new([DataPath::Images], [DataPath::Text]);
        assert!(a.is_swap_compatible(&b));
        assert!(!a.is_swap_compatible(&c));
    }

    #[test]
    fn test_options_overlay_is_shallow() {
        let base = StepOptions::from_value(serde_json::json!({
            "threshold": 0.5,
            "provider": "default"
        }))
        .unwrap();
        let overlay = StepOptions::from_value(serde_json::json!({"provider": "claid"})).unwrap();

        let merged = base.overlaid_with(&overlay);
        assert_eq!(merged.get_str("provider"), Some("claid"));
        assert_eq!(merged.get_f64("threshold"), Some(0.5));
    }

    #[test]
    fn test_options_reject_non_object() {
        assert!(StepOptions::from_value(serde_json::json!([1, 2])).is_err());
    }

    #[test]
    fn test_io_describe_quotes_both_sets() {
        let io = ProcessorIo::new([DataPath::Video], [DataPath::Frames, DataPath::Images]);
        assert_eq!(io.describe(), "requires=[video] produces=[frames, images]");
    }
}
