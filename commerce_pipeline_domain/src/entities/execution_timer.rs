// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Execution Timer
//!
//! Nested step + operation timing for one stack execution. The executor opens
//! a step scope per processor; processors record named operations (provider
//! calls, uploads, per-item batches) inside the current scope. Closing the
//! timer yields an aggregated [`TimerSummary`] suitable for a single log
//! line.
//!
//! Interior mutability keeps the API `&self` so the timer can be shared with
//! parallel per-item work through the processor context.

use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Aggregated timing for one named operation within a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationSummary {
    pub name: String,
    pub count: u32,
    pub total: Duration,
}

/// Timing for one executed step.
#[derive(Debug, Clone)]
pub struct StepSummary {
    pub processor_id: String,
    pub duration: Duration,
    pub operations: Vec<OperationSummary>,
}

/// Aggregated view of a closed timer.
#[derive(Debug, Clone)]
pub struct TimerSummary {
    pub total: Duration,
    pub steps: Vec<StepSummary>,
}

impl Display for TimerSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "total={:?}", self.total)?;
        for step in &self.steps {
            write!(f, " {}={:?}", step.processor_id, step.duration)?;
            for op in &step.operations {
                write!(f, " {}.{}x{}={:?}", step.processor_id, op.name, op.count, op.total)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
struct OpenStep {
    processor_id: String,
    started: Instant,
    operations: BTreeMap<String, (u32, Duration)>,
}

#[derive(Debug, Default)]
struct TimerState {
    open: Option<OpenStep>,
    steps: Vec<StepSummary>,
}

/// Step + operation timer for one stack execution.
#[derive(Debug)]
pub struct ExecutionTimer {
    started: Instant,
    state: Mutex<TimerState>,
}

impl ExecutionTimer {
    /// Opens the timer.
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            state: Mutex::new(TimerState::default()),
        }
    }

    /// Begins a step scope; an unclosed previous scope is finished first.
    pub fn start_step(&self, processor_id: &str) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.open.is_some() {
            Self::close_open(&mut state);
        }
        state.open = Some(OpenStep {
            processor_id: processor_id.to_string(),
            started: Instant::now(),
            operations: BTreeMap::new(),
        });
    }

    /// Ends the current step scope.
    pub fn finish_step(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Self::close_open(&mut state);
    }

    /// Records one timed operation inside the current step scope. Operations
    /// with the same name aggregate (count + total duration).
    pub fn record_operation(&self, name: &str, duration: Duration) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(open) = state.open.as_mut() {
            let entry = open
                .operations
                .entry(name.to_string())
                .or_insert((0, Duration::ZERO));
            entry.0 += 1;
            entry.1 += duration;
        }
    }

    /// Times an operation by running the closure inside a measurement.
    pub fn time_operation<T>(&self, name: &str, f: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let value = f();
        self.record_operation(name, started.elapsed());
        value
    }

    /// Closes the timer and returns the aggregated summary.
    pub fn finish(&self) -> TimerSummary {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Self::close_open(&mut state);
        TimerSummary {
            total: self.started.elapsed(),
            steps: state.steps.clone(),
        }
    }

    fn close_open(state: &mut TimerState) {
        if let Some(open) = state.open.take() {
            state.steps.push(StepSummary {
                processor_id: open.processor_id,
                duration: open.started.elapsed(),
                operations: open
                    .operations
                    .into_iter()
                    .map(|(name, (count, total))| OperationSummary { name, count, total })
                    .collect(),
            });
        }
    }
}

impl Default for ExecutionTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_recorded_in_order() {
        let timer = ExecutionTimer::new();
        timer.start_step("download");
        timer.finish_step();
        timer.start_step("extract-frames");
        timer.finish_step();

        let summary = timer.finish();
        let ids: Vec<_> = summary.steps.iter().map(|s| s.processor_id.as_str()).collect();
        assert_eq!(ids, vec!["download", "extract-frames"]);
    }

    #[test]
    fn test_operations_aggregate_by_name() {
        let timer = ExecutionTimer::new();
        timer.start_step("upload-frames");
        timer.record_operation("put_object", Duration::from_millis(5));
        timer.record_operation("put_object", Duration::from_millis(7));
        timer.record_operation("sign", Duration::from_millis(1));
        timer.finish_step();

        let summary = timer.finish();
        let ops = &summary.steps[0].operations;
        let put = ops.iter().find(|o| o.name == "put_object").unwrap();
        assert_eq!(put.count, 2);
        assert!(put.total >= Duration::from_millis(12));
        assert_eq!(ops.iter().find(|o| o.name == "sign").unwrap().count, 1);
    }

    #[test]
    fn test_unclosed_step_closed_by_finish() {
        let timer = ExecutionTimer::new();
        timer.start_step("score-frames");
        let summary = timer.finish();
        assert_eq!(summary.steps.len(), 1);
    }

    #[test]
    fn test_summary_display_is_one_line() {
        let timer = ExecutionTimer::new();
        timer.start_step("download");
        timer.finish_step();
        let line = timer.finish().to_string();
        assert!(line.contains("download="));
        assert!(!line.contains('\n'));
    }
}
