// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Credit Receipt Identifier
//!
//! Identifies a pre-authorized hold on a user's credit balance. Exactly one
//! of commit/refund must eventually run against every receipt.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use ulid::Ulid;

use crate::PipelineError;

/// Unique identifier for a credit reservation receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiptId(Ulid);

impl ReceiptId {
    /// Generates a new receipt identifier.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parses a receipt identifier from its canonical string form.
    pub fn parse(s: &str) -> Result<Self, PipelineError> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| PipelineError::validation(format!("invalid receipt id '{}': {}", s, e)))
    }
}

impl Default for ReceiptId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ReceiptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
