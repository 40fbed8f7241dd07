// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Value Objects
//!
//! Immutable, identity-free domain values: typed identifiers, the data-path
//! capability vocabulary, the commercial version set, the per-job filesystem
//! sandbox, and the cooperative cancellation flag.

pub mod cancellation_token;
pub mod commercial_version;
pub mod data_path;
pub mod frame_id;
pub mod job_id;
pub mod receipt_id;
pub mod work_dirs;

pub use cancellation_token::CancellationToken;
pub use commercial_version::CommercialVersion;
pub use data_path::DataPath;
pub use frame_id::FrameId;
pub use job_id::JobId;
pub use receipt_id::ReceiptId;
pub use work_dirs::WorkDirs;
