// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Video Commerce Pipeline Domain
//!
//! Pure domain layer for the video-to-commerce processing pipeline. This crate
//! holds the business model and the ports the application layer implements:
//!
//! - **Entities**: [`Job`], [`PipelineData`], [`FrameMetadata`],
//!   [`ProcessorContext`], [`ExecutionTimer`]
//! - **Value objects**: typed identifiers, [`DataPath`], [`CommercialVersion`],
//!   [`WorkDirs`], [`CancellationToken`]
//! - **Domain services**: the processor contract, stack templates, the stack
//!   validator and configurator, the provider registry
//! - **Ports**: [`JobStore`], [`BlobStore`], [`JobQueue`], [`CreditLedger`],
//!   [`CallbackTransport`]
//!
//! ## Layering Rules
//!
//! The domain crate is runtime-free: no tokio, no tracing, no drivers. I/O
//! bound ports are declared with `async-trait` and implemented by the
//! infrastructure layer of the `commerce-pipeline` crate.

pub mod entities;
pub mod error;
pub mod repositories;
pub mod services;
pub mod value_objects;

// Re-export the types that make up the public face of the domain so that
// application code can use `commerce_pipeline_domain::Job` style imports.
pub use entities::execution_timer::{ExecutionTimer, TimerSummary};
pub use entities::frame_metadata::FrameMetadata;
pub use entities::job::{Job, JobConfig, JobProgress, JobResult, JobStatus};
pub use entities::pipeline_data::{
    AudioData, DataPatch, PipelineData, PipelineMetadata, ProductMetadata, VideoData,
};
pub use entities::processor_context::{ProcessorContext, ProgressSink, ProgressUpdate};
pub use error::pipeline_error::PipelineError;
pub use repositories::blob_store::BlobStore;
pub use repositories::job_queue::{JobQueue, QueueDelivery};
pub use repositories::job_repository::JobStore;
pub use services::credit_service::{CreditLedger, CreditReceipt};
pub use services::notification::{CallbackPayload, CallbackTransport};
pub use services::processor::{Processor, ProcessorIo, StepOptions, StepOutput};
pub use services::processor_registry::{ProcessorCatalog, ProcessorRegistry};
pub use services::provider_registry::{AbTest, AbVariant, ProviderRegistry, Selection};
pub use services::stack::{StackConfig, StackStep, StackTemplate, StepCondition, StepInsertion};
pub use value_objects::cancellation_token::CancellationToken;
pub use value_objects::commercial_version::CommercialVersion;
pub use value_objects::data_path::DataPath;
pub use value_objects::frame_id::FrameId;
pub use value_objects::job_id::JobId;
pub use value_objects::receipt_id::ReceiptId;
pub use value_objects::work_dirs::WorkDirs;
