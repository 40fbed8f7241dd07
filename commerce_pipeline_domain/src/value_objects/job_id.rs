// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Job Identifier Value Object
//!
//! Strongly-typed identifier for processing jobs.
//!
//! ## Overview
//!
//! `JobId` wraps a ULID, giving jobs an opaque 128-bit identity with:
//!
//! - **Type safety**: a `JobId` cannot be confused with a [`FrameId`] or
//!   [`ReceiptId`] in function signatures
//! - **Temporal ordering**: ULIDs sort by creation time, so job listings and
//!   queue claims come out in chronological order for free
//! - **Cross-system stability**: the canonical form is the 26-character ULID
//!   string, used verbatim in the database, blob keys, queue messages, and
//!   callback payloads
//!
//! [`FrameId`]: super::frame_id::FrameId
//! [`ReceiptId`]: super::receipt_id::ReceiptId

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use ulid::Ulid;

use crate::PipelineError;

/// Unique identifier for a processing job.
///
/// Immutable value object; create with [`JobId::new`] for a fresh identity or
/// [`JobId::parse`] when rehydrating from storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Ulid);

impl JobId {
    /// Generates a new, time-ordered job identifier.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parses a job identifier from its canonical ULID string form.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Validation` when the string is not a valid
    /// ULID.
    pub fn parse(s: &str) -> Result<Self, PipelineError> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| PipelineError::validation(format!("invalid job id '{}': {}", s, e)))
    }

    /// Returns the creation timestamp encoded in the identifier (ms since
    /// the Unix epoch).
    pub fn timestamp_ms(&self) -> u64 {
        self.0.timestamp_ms()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
