// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Video Commerce Pipeline
//!
//! Application and infrastructure layers of the video-to-commerce
//! processing pipeline: the stack runtime (validator, configurator,
//! executor, parallel primitive), SQLite-backed job persistence and work
//! queue, the built-in processor suite and stack catalogue, and the queue
//! worker with its job lifecycle bookkeeping.

pub mod application;
pub mod infrastructure;
pub mod presentation;

// Re-export the domain surface so binaries and tests have one import root.
pub use commerce_pipeline_domain::{
    CancellationToken, DataPath, FrameMetadata, Job, JobConfig, JobId, JobProgress, JobResult,
    JobStatus, PipelineData, PipelineError, ProcessorContext, ProcessorRegistry, ProviderRegistry,
    StackConfig, StackStep, StackTemplate, WorkDirs,
};
