// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Repository Ports
//!
//! Narrow async interfaces to durable storage: the job store, the blob store,
//! and the retrying work queue. The infrastructure layer of the
//! `commerce-pipeline` crate provides the SQLite/filesystem implementations.

pub mod blob_store;
pub mod job_queue;
pub mod job_repository;

pub use blob_store::BlobStore;
pub use job_queue::{JobQueue, QueueDelivery};
pub use job_repository::JobStore;
