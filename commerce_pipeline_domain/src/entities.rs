// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Entities
//!
//! Identity-bearing domain objects: the durable [`Job`] record, the
//! [`PipelineData`] record threaded through a stack execution, per-frame
//! [`FrameMetadata`], the [`ProcessorContext`] handed to every processor, and
//! the [`ExecutionTimer`] that aggregates step and operation timings.

pub mod execution_timer;
pub mod frame_metadata;
pub mod job;
pub mod pipeline_data;
pub mod processor_context;

pub use execution_timer::{ExecutionTimer, TimerSummary};
pub use frame_metadata::FrameMetadata;
pub use job::{Job, JobConfig, JobProgress, JobResult, JobStatus};
pub use pipeline_data::{
    AudioData, DataPatch, PipelineData, PipelineMetadata, ProductMetadata, VideoData,
};
pub use processor_context::{ProcessorContext, ProgressSink, ProgressUpdate};
