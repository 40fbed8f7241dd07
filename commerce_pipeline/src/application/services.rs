// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Application Services

pub mod job_service;
pub mod webhook_service;
pub mod worker_service;

pub use job_service::{JobService, SubmitJobRequest};
pub use webhook_service::WebhookService;
pub use worker_service::WorkerService;
