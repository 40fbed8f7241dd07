// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Frame Identifier Value Object
//!
//! Stable per-frame identity, assigned once at extraction time and preserved
//! through scoring, classification, persistence, and commercial fan-out.
//! Versioned frames get a fresh `FrameId` and keep a `source_frame_id` link
//! back to the frame they were derived from.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use ulid::Ulid;

use crate::PipelineError;

/// Unique identifier for an extracted video frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(Ulid);

impl FrameId {
    /// Generates a new frame identifier.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parses a frame identifier from its canonical string form.
    pub fn parse(s: &str) -> Result<Self, PipelineError> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| PipelineError::validation(format!("invalid frame id '{}': {}", s, e)))
    }
}

impl Default for FrameId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
